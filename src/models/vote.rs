use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::{
    config::VoterPolicy,
    errors::AppError,
    models::target::TargetRef,
};

/// Resolved identity of whoever is voting. The IP is always known; the user
/// id only when the request carried a valid token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Voter {
    pub user_id: Option<Uuid>,
    pub ip: String,
}

impl Voter {
    pub fn authenticated(user_id: Uuid, ip: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id),
            ip: ip.into(),
        }
    }

    pub fn anonymous(ip: impl Into<String>) -> Self {
        Self {
            user_id: None,
            ip: ip.into(),
        }
    }

    /// Policy gate for the vote protocol. Under the user-required policy an
    /// anonymous vote is rejected before anything is written.
    pub fn check_policy(&self, policy: VoterPolicy) -> Result<(), AppError> {
        if policy == VoterPolicy::UserRequired && self.user_id.is_none() {
            return Err(AppError::Validation(
                "Anonymous voting is not allowed".into(),
            ));
        }
        Ok(())
    }
}

/// One voter's current vote for one target. Repeat votes from the same voter
/// update this row in place, never add a second one.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct RatingEvent {
    pub id: i64,
    pub target_kind: String,
    pub target_id: i64,
    pub ip: String,
    pub user_id: Option<Uuid>,
    /// 0 means "not yet voted"; cast votes are in 1..=100.
    pub value: i32,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,

    /// True while an update-in-progress replaces an earlier vote.
    #[sqlx(default)]
    #[serde(skip)]
    pub is_changing: bool,
    /// The persisted value before this update, valid when `is_changing`.
    #[sqlx(default)]
    #[serde(skip)]
    pub old_value: i32,
}

impl RatingEvent {
    pub fn target(&self) -> TargetRef {
        TargetRef::new(self.target_kind.clone(), self.target_id)
    }

    /// The vote on a 1-5 scale.
    pub fn stars_value(&self) -> i32 {
        self.value / 20
    }

    /// Human label for the five canonical magnitudes; anything else maps to
    /// the empty string rather than an error.
    pub fn verbal_value(&self) -> &'static str {
        verbal_value(self.value)
    }
}

pub fn verbal_value(value: i32) -> &'static str {
    match value {
        20 => "Very bad",
        40 => "Not much",
        60 => "Average",
        80 => "Good",
        100 => "Excellent",
        _ => "",
    }
}

/// Coerces the raw `vote` form field the way the original voting widget
/// expects: parse as float, truncate to an integer ("90.7" votes 90).
pub fn parse_vote_magnitude(raw: &str) -> Result<i32, AppError> {
    let parsed = raw
        .trim()
        .parse::<f64>()
        .map_err(|_| AppError::BadRequest(format!("Non-numeric vote: {}", raw)))?;

    if !parsed.is_finite() {
        return Err(AppError::BadRequest(format!("Non-numeric vote: {}", raw)));
    }

    Ok(parsed as i32)
}

/// A submitted vote magnitude must land in (0, 100]. The canonical scale is
/// multiples of 20 but raw magnitudes like 90 are accepted, matching the
/// averages clients expect (90 -> 4.5 stars).
pub fn validate_vote_value(value: i32) -> Result<(), AppError> {
    if value <= 0 || value > 100 {
        return Err(AppError::Validation(format!(
            "Vote value must be between 1 and 100, got {}",
            value
        )));
    }
    Ok(())
}
