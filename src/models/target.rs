use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::AppError;

/// Generic pointer to the thing being rated. The rated entity itself lives
/// outside this service; we only carry its kind tag and id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TargetRef {
    pub kind: String,
    pub id: i64,
}

impl TargetRef {
    pub fn new(kind: impl Into<String>, id: i64) -> Self {
        Self {
            kind: kind.into(),
            id,
        }
    }

    /// Composite form handed to clients, e.g. "article_42".
    pub fn key(&self) -> String {
        format!("{}_{}", self.kind, self.id)
    }

    /// Parses a composite key. The id sits after the last underscore so kind
    /// tags containing underscores still round-trip.
    pub fn split_key(key: &str) -> Result<Self, AppError> {
        let (kind, id) = key
            .rsplit_once('_')
            .ok_or_else(|| AppError::BadRequest(format!("Invalid target key: {}", key)))?;

        if kind.is_empty() {
            return Err(AppError::BadRequest(format!("Invalid target key: {}", key)));
        }

        let id = id
            .parse::<i64>()
            .map_err(|_| AppError::BadRequest(format!("Invalid target id in key: {}", key)))?;

        Ok(Self::new(kind, id))
    }
}

/// Lookup capability for one kind of target. Collaborators register one per
/// rated entity type; `all_ids` feeds the backfill job.
#[async_trait]
pub trait TargetSource: Send + Sync {
    async fn exists(&self, id: i64) -> Result<bool, AppError>;

    async fn all_ids(&self) -> Result<Vec<i64>, AppError>;
}

/// Source for kinds the deployment trusts without a lookup backend. Every id
/// is accepted and there is nothing to backfill.
pub struct TrustedKind;

#[async_trait]
impl TargetSource for TrustedKind {
    async fn exists(&self, _id: i64) -> Result<bool, AppError> {
        Ok(true)
    }

    async fn all_ids(&self) -> Result<Vec<i64>, AppError> {
        Ok(Vec::new())
    }
}

/// Maps kind tags to their lookup sources. The optional override intercepts
/// all lookups, for callers that front their object access with a cache.
#[derive(Clone, Default)]
pub struct TargetRegistry {
    sources: HashMap<String, Arc<dyn TargetSource>>,
    lookup_override: Option<Arc<dyn TargetSource>>,
}

impl TargetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, kind: impl Into<String>, source: Arc<dyn TargetSource>) {
        self.sources.insert(kind.into(), source);
    }

    pub fn set_lookup_override(&mut self, source: Arc<dyn TargetSource>) {
        self.lookup_override = Some(source);
    }

    pub fn source(&self, kind: &str) -> Result<Arc<dyn TargetSource>, AppError> {
        self.sources
            .get(kind)
            .cloned()
            .ok_or_else(|| AppError::BadRequest(format!("Unknown target kind: {}", kind)))
    }

    /// Resolves a composite key to a target, checking the kind is known and
    /// the instance exists.
    pub async fn resolve(&self, key: &str) -> Result<TargetRef, AppError> {
        let target = TargetRef::split_key(key)?;
        let source = match &self.lookup_override {
            Some(src) => src.clone(),
            None => self.source(&target.kind)?,
        };

        if !source.exists(target.id).await? {
            return Err(AppError::NotFound(format!(
                "Target {} does not exist",
                target.key()
            )));
        }

        Ok(target)
    }
}
