use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

use super::definition::{SurveyDefinition, TenantId};
use super::session::{ParticipantId, ParticipantSession, SessionId, SessionStatus};

/// Storage abstraction keyed by `(tenantId, sessionId)` so the orchestrator
/// can be exercised in isolation. Each engine operation performs exactly one
/// read-modify-write cycle against this port.
pub trait SessionStore: Send + Sync {
    fn create_session(&self, session: ParticipantSession)
        -> Result<ParticipantSession, StoreError>;

    fn session(
        &self,
        id: &SessionId,
        tenant: &TenantId,
    ) -> Result<Option<ParticipantSession>, StoreError>;

    /// Compare-and-swap on `session.version`: a write carrying a stale
    /// version must be rejected with `VersionConflict`, never applied.
    fn update_session(&self, session: ParticipantSession)
        -> Result<ParticipantSession, StoreError>;

    fn sessions_by_survey(
        &self,
        survey: &super::definition::SurveyId,
        tenant: &TenantId,
        filters: &SessionFilters,
    ) -> Result<Vec<ParticipantSession>, StoreError>;

    /// Filtering and serialization are the store's concern; the engine only
    /// requests the export and stamps a generation timestamp.
    fn export_results(
        &self,
        survey: &SurveyDefinition,
        tenant: &TenantId,
        format: ExportFormat,
        filters: &SessionFilters,
    ) -> Result<ExportBatch, StoreError>;

    fn health_check(&self) -> bool;
}

/// Error enumeration for storage failures.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("session already exists")]
    Conflict,
    #[error("session not found")]
    NotFound,
    #[error("stale session write (expected version {expected}, found {found})")]
    VersionConflict { expected: u64, found: u64 },
    #[error("session store unavailable: {0}")]
    Unavailable(String),
    #[error("export failed: {0}")]
    Export(String),
}

/// Session selection criteria for listing and export. Unmatched filters yield
/// zero records, not an error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionFilters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<SessionStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_after: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_before: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub participant_ids: Vec<ParticipantId>,
}

impl SessionFilters {
    pub fn matches(&self, session: &ParticipantSession) -> bool {
        if let Some(status) = self.status {
            if session.status != status {
                return false;
            }
        }
        if let Some(after) = self.started_after {
            if session.started_at < after {
                return false;
            }
        }
        if let Some(before) = self.started_before {
            if session.started_at > before {
                return false;
            }
        }
        if !self.participant_ids.is_empty()
            && !self.participant_ids.contains(&session.participant_id)
        {
            return false;
        }
        true
    }
}

/// Serialization formats supported by `export_results`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Csv,
    Json,
}

impl ExportFormat {
    pub const fn label(self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
        }
    }
}

/// Serialized export produced by the store.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportBatch {
    pub data: String,
    pub record_count: usize,
}

/// Time source injected into the orchestrator instead of reaching for an
/// ambient global.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock default.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Session id source injected into the orchestrator.
pub trait SessionIdGenerator: Send + Sync {
    fn next_session_id(&self) -> SessionId;
}

/// Monotonic in-process default producing ids like `sess-000001`.
#[derive(Debug, Default)]
pub struct SequenceIdGenerator {
    sequence: AtomicU64,
}

impl SessionIdGenerator for SequenceIdGenerator {
    fn next_session_id(&self) -> SessionId {
        let id = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        SessionId(format!("sess-{id:06}"))
    }
}
