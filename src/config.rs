use crate::errors::AppError;

/// One year. Aggregates untouched for longer than this are dropped by the
/// cleanup job along with their vote records.
pub const DEFAULT_RETENTION_SECONDS: u64 = 31_536_000;

/// Which identity axis makes a vote unique per target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoterPolicy {
    /// Anonymous votes are rejected outright; votes dedupe by user id.
    UserRequired,
    /// Anonymous votes dedupe by IP, authenticated ones by user id.
    IpBased,
}

#[derive(Debug, Clone)]
pub struct RatingConfig {
    pub voter_policy: VoterPolicy,
    pub retention_seconds: u64,
    /// Target kinds that get a zero-valued aggregate from the backfill job
    /// and the post-create hook.
    pub auto_create_for_types: Vec<String>,
    /// Target kinds a standalone deployment accepts without a registered
    /// lookup source.
    pub trusted_kinds: Vec<String>,
}

impl Default for RatingConfig {
    fn default() -> Self {
        Self {
            voter_policy: VoterPolicy::UserRequired,
            retention_seconds: DEFAULT_RETENTION_SECONDS,
            auto_create_for_types: Vec::new(),
            trusted_kinds: Vec::new(),
        }
    }
}

impl RatingConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let disable_anonymous = match std::env::var("DISABLE_ANONYMOUS_USERS") {
            Ok(v) => parse_bool(&v)?,
            Err(_) => true,
        };

        let retention_seconds = match std::env::var("RATING_RETENTION_SECONDS") {
            Ok(v) => v.parse::<u64>().map_err(|e| {
                AppError::EnvError(format!("Invalid RATING_RETENTION_SECONDS: {}", e))
            })?,
            Err(_) => DEFAULT_RETENTION_SECONDS,
        };

        Ok(Self {
            voter_policy: if disable_anonymous {
                VoterPolicy::UserRequired
            } else {
                VoterPolicy::IpBased
            },
            retention_seconds,
            auto_create_for_types: parse_kind_list("AUTO_CREATE_RATING_KINDS"),
            trusted_kinds: parse_kind_list("RATING_TARGET_KINDS"),
        })
    }

    pub fn auto_creates(&self, kind: &str) -> bool {
        self.auto_create_for_types.iter().any(|k| k == kind)
    }
}

fn parse_bool(raw: &str) -> Result<bool, AppError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" => Ok(false),
        other => Err(AppError::EnvError(format!(
            "Expected a boolean, got '{}'",
            other
        ))),
    }
}

fn parse_kind_list(var: &str) -> Vec<String> {
    std::env::var(var)
        .unwrap_or_default()
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
