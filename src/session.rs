use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::analyzer::{Analysis, ColumnProfile, RowInsight};
use crate::error::Result;
use crate::models::DateRange;

/// Sessions bridge the upload/paste step and the mapping/commit step of
/// the wizard; after this window the caller re-uploads.
pub const SESSION_TTL_MINUTES: i64 = 120;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionMeta {
    /// "file" or "clipboard".
    pub source: String,
    pub file_name: Option<String>,
    pub total_rows: usize,
    pub total_columns: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionAnalysis {
    pub columns: Vec<ColumnProfile>,
    pub header_candidates: Vec<usize>,
    pub detected_date_range: DateRange,
    pub numeric_columns: Vec<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionPayload {
    pub meta: SessionMeta,
    pub rows: Vec<RowInsight>,
    pub analysis: SessionAnalysis,
}

impl SessionPayload {
    pub fn from_analysis(meta: SessionMeta, analysis: Analysis) -> Self {
        Self {
            meta,
            rows: analysis.rows,
            analysis: SessionAnalysis {
                columns: analysis.columns,
                header_candidates: analysis.header_candidates,
                detected_date_range: analysis.detected_date_range,
                numeric_columns: analysis.numeric_columns,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportSession {
    pub id: String,
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    pub payload: SessionPayload,
}

/// Durable, user-scoped, TTL-bound holding area for analyzed datasets.
/// One JSON file per session; the user id is part of the storage key, so
/// one user can never address another user's session.
pub struct SessionStore {
    root: PathBuf,
}

impl SessionStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn create(
        &self,
        user_id: i64,
        payload: SessionPayload,
        now: DateTime<Utc>,
    ) -> Result<ImportSession> {
        let session = ImportSession {
            id: Uuid::new_v4().to_string(),
            user_id,
            created_at: now,
            expires_at: now + Duration::minutes(SESSION_TTL_MINUTES),
            updated_at: None,
            payload,
        };
        self.write(&session)?;
        Ok(session)
    }

    /// Returns None for a missing session, and lazily deletes and
    /// returns None for an expired one.
    pub fn get(
        &self,
        user_id: i64,
        session_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<ImportSession>> {
        let Some(path) = self.session_path(user_id, session_id) else {
            return Ok(None);
        };
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&path)?;
        let Ok(session) = serde_json::from_str::<ImportSession>(&content) else {
            return Ok(None);
        };

        if now > session.expires_at {
            let _ = std::fs::remove_file(&path);
            return Ok(None);
        }

        Ok(Some(session))
    }

    pub fn update(
        &self,
        user_id: i64,
        session_id: &str,
        now: DateTime<Utc>,
        mutator: impl FnOnce(&mut ImportSession),
    ) -> Result<Option<ImportSession>> {
        let Some(mut session) = self.get(user_id, session_id, now)? else {
            return Ok(None);
        };
        mutator(&mut session);
        session.updated_at = Some(now);
        self.write(&session)?;
        Ok(Some(session))
    }

    pub fn delete(&self, user_id: i64, session_id: &str) -> Result<()> {
        if let Some(path) = self.session_path(user_id, session_id) {
            if path.exists() {
                std::fs::remove_file(path)?;
            }
        }
        Ok(())
    }

    fn write(&self, session: &ImportSession) -> Result<()> {
        let path = self
            .root
            .join(session.user_id.to_string())
            .join(format!("{}.json", session.id));
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, serde_json::to_string_pretty(session)?)?;
        Ok(())
    }

    /// None for ids that are not plausible session tokens; keeps caller
    /// input from escaping the store directory.
    fn session_path(&self, user_id: i64, session_id: &str) -> Option<PathBuf> {
        if session_id.is_empty()
            || !session_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-')
        {
            return None;
        }
        Some(
            self.root
                .join(user_id.to_string())
                .join(format!("{session_id}.json")),
        )
    }
}

pub fn default_session_root(data_dir: &Path) -> PathBuf {
    data_dir.join("import_sessions")
}
