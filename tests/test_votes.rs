use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use star_ratings_be::config::{RatingConfig, VoterPolicy};
use star_ratings_be::db::backfill::backfill_targets;
use star_ratings_be::db::cleanup::cleanup_cutoff;
use star_ratings_be::errors::{AppError, is_unique_violation};
use star_ratings_be::models::target::TrustedKind;
use star_ratings_be::models::vote::{parse_vote_magnitude, validate_vote_value, verbal_value};
use star_ratings_be::models::{RatingEvent, TargetRef, TargetRegistry, TargetSource, Voter};
use uuid::Uuid;

fn event_with_value(value: i32) -> RatingEvent {
    RatingEvent {
        id: 1,
        target_kind: "article".into(),
        target_id: 7,
        ip: "127.0.0.1".into(),
        user_id: None,
        value,
        created: Utc::now(),
        updated: Utc::now(),
        is_changing: false,
        old_value: 0,
    }
}

#[test]
fn test_stars_value_is_value_over_twenty() {
    assert_eq!(event_with_value(80).stars_value(), 4);
    assert_eq!(event_with_value(100).stars_value(), 5);
    assert_eq!(event_with_value(90).stars_value(), 4);
    assert_eq!(event_with_value(0).stars_value(), 0);
}

#[test]
fn test_verbal_value_canonical_magnitudes() {
    assert_eq!(verbal_value(20), "Very bad");
    assert_eq!(verbal_value(40), "Not much");
    assert_eq!(verbal_value(60), "Average");
    assert_eq!(verbal_value(80), "Good");
    assert_eq!(verbal_value(100), "Excellent");
}

#[test]
fn test_verbal_value_is_lookup_not_error() {
    // Off-scale magnitudes map to the empty label
    assert_eq!(verbal_value(30), "");
    assert_eq!(verbal_value(0), "");
    assert_eq!(verbal_value(90), "");
}

#[test]
fn test_vote_value_range() {
    // Valid cases
    assert!(validate_vote_value(20).is_ok());
    assert!(validate_vote_value(90).is_ok());
    assert!(validate_vote_value(100).is_ok());
    assert!(validate_vote_value(1).is_ok());

    // Invalid cases
    assert!(validate_vote_value(0).is_err());
    assert!(validate_vote_value(-20).is_err());
    assert!(validate_vote_value(101).is_err());
}

#[test]
fn test_vote_magnitude_coercion() {
    // Parse as float, truncate to an integer
    assert_eq!(parse_vote_magnitude("90").unwrap(), 90);
    assert_eq!(parse_vote_magnitude("90.7").unwrap(), 90);
    assert_eq!(parse_vote_magnitude(" 40 ").unwrap(), 40);

    // Invalid cases
    assert!(matches!(
        parse_vote_magnitude("abc"),
        Err(AppError::BadRequest(_))
    ));
    assert!(matches!(
        parse_vote_magnitude(""),
        Err(AppError::BadRequest(_))
    ));
    assert!(matches!(
        parse_vote_magnitude("NaN"),
        Err(AppError::BadRequest(_))
    ));
}

#[test]
fn test_target_key_composition() {
    let target = TargetRef::new("article", 42);
    assert_eq!(target.key(), "article_42");
}

#[test]
fn test_target_key_round_trip() {
    let parsed = TargetRef::split_key("article_42").unwrap();
    assert_eq!(parsed, TargetRef::new("article", 42));

    // Kind tags with underscores split at the last one
    let parsed = TargetRef::split_key("blog_post_7").unwrap();
    assert_eq!(parsed, TargetRef::new("blog_post", 7));
}

#[test]
fn test_target_key_rejects_malformed_input() {
    assert!(matches!(
        TargetRef::split_key("nounderscore"),
        Err(AppError::BadRequest(_))
    ));
    assert!(matches!(
        TargetRef::split_key("article_notanumber"),
        Err(AppError::BadRequest(_))
    ));
    assert!(matches!(
        TargetRef::split_key("_42"),
        Err(AppError::BadRequest(_))
    ));
    assert!(matches!(
        TargetRef::split_key(""),
        Err(AppError::BadRequest(_))
    ));
}

#[test]
fn test_anonymous_vote_rejected_when_user_required() {
    let voter = Voter::anonymous("127.0.0.1");
    let result = voter.check_policy(VoterPolicy::UserRequired);
    assert!(matches!(result, Err(AppError::Validation(_))));
}

#[test]
fn test_anonymous_vote_allowed_under_ip_policy() {
    let voter = Voter::anonymous("127.0.0.1");
    assert!(voter.check_policy(VoterPolicy::IpBased).is_ok());
}

#[test]
fn test_authenticated_vote_allowed_under_both_policies() {
    let voter = Voter::authenticated(Uuid::new_v4(), "127.0.0.1");
    assert!(voter.check_policy(VoterPolicy::UserRequired).is_ok());
    assert!(voter.check_policy(VoterPolicy::IpBased).is_ok());
}

#[test]
fn test_cleanup_cutoff_selects_only_stale_ratings() {
    let now = Utc.with_ymd_and_hms(2026, 6, 1, 12, 0, 0).unwrap();
    let cutoff = cleanup_cutoff(now, 31_536_000);

    // One-year retention: a rating last touched 400 days ago is due for
    // deletion, one touched 30 days ago is kept.
    let stale = now - Duration::days(400);
    let fresh = now - Duration::days(30);
    assert!(stale <= cutoff);
    assert!(fresh > cutoff);
}

/// Database error with a fixed SQLSTATE, standing in for what the driver
/// returns when an insert hits a unique index.
#[derive(Debug)]
struct SqlstateError(&'static str);

impl std::fmt::Display for SqlstateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SQLSTATE {}", self.0)
    }
}

impl std::error::Error for SqlstateError {}

impl sqlx::error::DatabaseError for SqlstateError {
    fn message(&self) -> &str {
        "constraint violated"
    }

    fn code(&self) -> Option<std::borrow::Cow<'_, str>> {
        Some(self.0.into())
    }

    fn kind(&self) -> sqlx::error::ErrorKind {
        if self.0 == "23505" {
            sqlx::error::ErrorKind::UniqueViolation
        } else {
            sqlx::error::ErrorKind::Other
        }
    }

    fn as_error(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
        self
    }

    fn as_error_mut(&mut self) -> &mut (dyn std::error::Error + Send + Sync + 'static) {
        self
    }

    fn into_error(self: Box<Self>) -> Box<dyn std::error::Error + Send + Sync + 'static> {
        self
    }
}

#[test]
fn test_unique_violation_triggers_the_retry_path() {
    // A raced vote insert surfaces as 23505; only that code warrants the
    // single retried lookup in the protocol.
    let raced = sqlx::Error::Database(Box::new(SqlstateError("23505")));
    assert!(is_unique_violation(&raced));
}

#[test]
fn test_other_errors_are_not_treated_as_conflicts() {
    let check = sqlx::Error::Database(Box::new(SqlstateError("23514")));
    assert!(!is_unique_violation(&check));
    assert!(!is_unique_violation(&sqlx::Error::RowNotFound));
}

/// Target source with a fixed id set, playing the collaborator's side of the
/// backfill job.
struct FixedIds(Vec<i64>);

#[async_trait]
impl TargetSource for FixedIds {
    async fn exists(&self, id: i64) -> Result<bool, AppError> {
        Ok(self.0.contains(&id))
    }

    async fn all_ids(&self) -> Result<Vec<i64>, AppError> {
        Ok(self.0.clone())
    }
}

#[tokio::test]
async fn test_backfill_targets_only_configured_kinds() {
    let mut registry = TargetRegistry::new();
    registry.register("article", Arc::new(FixedIds(vec![1, 2, 3])));
    registry.register("comment", Arc::new(FixedIds(vec![9])));

    let config = RatingConfig {
        auto_create_for_types: vec!["article".into()],
        ..Default::default()
    };

    let candidates = backfill_targets(&config, &registry).await.unwrap();
    assert_eq!(
        candidates,
        vec![
            TargetRef::new("article", 1),
            TargetRef::new("article", 2),
            TargetRef::new("article", 3),
        ]
    );
}

#[tokio::test]
async fn test_backfill_requires_a_source_for_configured_kinds() {
    let registry = TargetRegistry::new();
    let config = RatingConfig {
        auto_create_for_types: vec!["article".into()],
        ..Default::default()
    };

    let result = backfill_targets(&config, &registry).await;
    assert!(matches!(result, Err(AppError::BadRequest(_))));
}

#[test]
fn test_auto_create_gate_matches_configured_kinds() {
    // The same gate guards the post-create hook
    let config = RatingConfig {
        auto_create_for_types: vec!["article".into()],
        ..Default::default()
    };

    assert!(config.auto_creates("article"));
    assert!(!config.auto_creates("comment"));
}

#[tokio::test]
async fn test_registry_resolves_registered_kind() {
    let mut registry = TargetRegistry::new();
    registry.register("article", Arc::new(TrustedKind));

    let target = registry.resolve("article_42").await.unwrap();
    assert_eq!(target, TargetRef::new("article", 42));
}

#[tokio::test]
async fn test_registry_rejects_unknown_kind() {
    let registry = TargetRegistry::new();

    let result = registry.resolve("article_42").await;
    assert!(matches!(result, Err(AppError::BadRequest(_))));
}

#[tokio::test]
async fn test_registry_lookup_override_takes_precedence() {
    let mut registry = TargetRegistry::new();
    registry.set_lookup_override(Arc::new(TrustedKind));

    // No source registered for the kind, the override answers instead
    let target = registry.resolve("article_1").await.unwrap();
    assert_eq!(target, TargetRef::new("article", 1));
}
