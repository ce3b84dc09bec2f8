use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::{
    errors::AppError,
    models::{target::TargetRef, vote::RatingEvent},
};

pub const MAX_STARS: i32 = 5;

/// Materialized per-target vote summary. The counters are maintained
/// incrementally as vote events arrive, never recomputed by scanning the
/// vote table.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Rating {
    pub id: i64,
    pub target_kind: String,
    pub target_id: i64,
    pub total_rating: i64,
    pub total_votes: i64,
    pub avg_rating: f64,
    pub percent: f64,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

impl Rating {
    pub fn target(&self) -> TargetRef {
        TargetRef::new(self.target_kind.clone(), self.target_id)
    }

    pub fn key(&self) -> String {
        self.target().key()
    }

    /// Folds the given vote event into the counters. A changing event first
    /// takes away the voter's previous value so re-votes are never counted
    /// twice.
    ///
    /// This does not persist. The caller must read, apply and write both the
    /// event and this aggregate inside one transaction, otherwise two
    /// concurrent votes can lose an update.
    pub fn add_rating(&mut self, event: &RatingEvent) -> Result<(), AppError> {
        if event.is_changing {
            self.total_rating -= i64::from(event.old_value);
            self.total_votes -= 1;
        }

        self.total_rating += i64::from(event.value);
        self.total_votes += 1;

        self.avg_rating = rounded_average(self.total_rating, self.total_votes);
        self.percent = self.avg_rating / MAX_STARS as f64;

        self.validate()
    }

    /// A negative average or percent means the counters were corrupted, not
    /// that input needs clamping. Writes must refuse it.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.avg_rating < 0.0 {
            return Err(AppError::Validation(format!(
                "Average rating may not be negative, got {}",
                self.avg_rating
            )));
        }
        if self.percent < 0.0 {
            return Err(AppError::Validation(format!(
                "Rating percent may not be negative, got {}",
                self.percent
            )));
        }
        Ok(())
    }
}

/// `total_rating / total_votes / 20`, rounded half-to-even at the tenths so
/// e.g. votes {90, 40} average to 3.2. Computed in integers to keep the
/// rounding exact.
pub fn rounded_average(total_rating: i64, total_votes: i64) -> f64 {
    if total_votes <= 0 {
        return 0.0;
    }

    let num = total_rating * 10;
    let den = total_votes * 20;
    let quot = num / den;
    let rem = num % den;

    let tenths = match (rem * 2).cmp(&den) {
        std::cmp::Ordering::Less => quot,
        std::cmp::Ordering::Greater => quot + 1,
        std::cmp::Ordering::Equal => {
            if quot % 2 == 0 {
                quot
            } else {
                quot + 1
            }
        }
    };

    tenths as f64 / 10.0
}

/// Formats an average the way clients expect it, always with one fractional
/// digit ("4.5", "0.0").
pub fn format_average(avg_rating: f64) -> String {
    format!("{:.1}", avg_rating)
}
