// Dismissal Service: Active/Dismissed/Snoozed lifecycle with append-only history.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

use crate::engines::shared::models::{DismissalRecord, DismissalStatus, LifecycleEvent, DISMISSAL_REASONS};
use crate::kvstore::KvStore;

#[derive(Debug, Error)]
pub enum DismissalError {
    #[error("unknown reason code '{0}'")]
    UnknownReason(String),
    #[error("recommendation '{0}' has no dismissal record")]
    NotFound(String),
    #[error(transparent)]
    Store(#[from] crate::kvstore::KvStoreError),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

fn validate_reason(reason: &str) -> Result<(), DismissalError> {
    if DISMISSAL_REASONS.contains(&reason) {
        Ok(())
    } else {
        Err(DismissalError::UnknownReason(reason.to_string()))
    }
}

/// Process-wide handle over the persisted dismissal store; constructed once
/// at startup and held as an `Arc` through operations, never a `static`.
pub struct DismissalService {
    store: Arc<dyn KvStore>,
}

impl DismissalService {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    fn load(&self, recommendation_id: &str) -> Result<Option<DismissalRecord>, DismissalError> {
        match self.store.get(recommendation_id)? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    fn save(&self, record: &DismissalRecord) -> Result<(), DismissalError> {
        let serialized = serde_json::to_string(record)?;
        self.store.set(&record.recommendation_id, &serialized)?;
        Ok(())
    }

    /// Any state transitions to Dismissed. Creates the record on first call.
    pub fn dismiss(&self, recommendation_id: &str, reason: &str, custom_reason: Option<String>) -> Result<DismissalRecord, DismissalError> {
        validate_reason(reason)?;
        self.transition(recommendation_id, DismissalStatus::Dismissed, reason, custom_reason, None)
    }

    /// Any state transitions to Snoozed with an expiry, including direct
    /// Snoozed <-> Dismissed re-transitions.
    pub fn snooze(&self, recommendation_id: &str, reason: &str, expires_at: DateTime<Utc>) -> Result<DismissalRecord, DismissalError> {
        validate_reason(reason)?;
        self.transition(recommendation_id, DismissalStatus::Snoozed, reason, None, Some(expires_at))
    }

    /// Dismissed or Snoozed -> Active. History is preserved, never deleted.
    pub fn undismiss(&self, recommendation_id: &str) -> Result<DismissalRecord, DismissalError> {
        let existing = self.load(recommendation_id)?.ok_or_else(|| DismissalError::NotFound(recommendation_id.to_string()))?;
        let mut record = existing;
        record.status = DismissalStatus::Active;
        record.expires_at = None;
        record.history.push(LifecycleEvent { action: DismissalStatus::Active, reason: None, timestamp: Utc::now(), expires_at: None });
        self.save(&record)?;
        Ok(record)
    }

    fn transition(
        &self,
        recommendation_id: &str,
        status: DismissalStatus,
        reason: &str,
        custom_reason: Option<String>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<DismissalRecord, DismissalError> {
        let now = Utc::now();
        let mut record = self.load(recommendation_id)?.unwrap_or(DismissalRecord {
            recommendation_id: recommendation_id.to_string(),
            status,
            reason: reason.to_string(),
            custom_reason: custom_reason.clone(),
            dismissed_at: now,
            expires_at,
            last_known: None,
            history: Vec::new(),
        });

        record.status = status;
        record.reason = reason.to_string();
        record.custom_reason = custom_reason;
        record.dismissed_at = now;
        record.expires_at = expires_at;
        record.history.push(LifecycleEvent { action: status, reason: Some(reason.to_string()), timestamp: now, expires_at });

        self.save(&record)?;
        Ok(record)
    }

    /// Sweeps every Snoozed record whose expiry has passed back to Active.
    pub fn sweep_expired(&self) -> Result<usize, DismissalError> {
        let now = Utc::now();
        let mut swept = 0;
        for key in self.store.keys()? {
            if let Some(mut record) = self.load(&key)? {
                if record.status == DismissalStatus::Snoozed {
                    if let Some(expires_at) = record.expires_at {
                        if expires_at <= now {
                            record.status = DismissalStatus::Active;
                            record.expires_at = None;
                            record.history.push(LifecycleEvent { action: DismissalStatus::Active, reason: None, timestamp: now, expires_at: None });
                            self.save(&record)?;
                            swept += 1;
                        }
                    }
                }
            }
        }
        Ok(swept)
    }

    pub fn history(&self, recommendation_id: &str) -> Result<Vec<LifecycleEvent>, DismissalError> {
        Ok(self.load(recommendation_id)?.map(|r| r.history).unwrap_or_default())
    }

    pub fn default_snooze_expiry(days: i64) -> DateTime<Utc> {
        Utc::now() + Duration::days(days)
    }
}
