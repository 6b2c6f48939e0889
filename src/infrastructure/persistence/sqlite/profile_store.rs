//! SQLite Profile Store
//!
//! 档案当前身份与身份记录的只读视图

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use super::DbPool;
use crate::application::ports::{ProfileStorePort, RepositoryError};
use crate::domain::voice::{IdentityId, IdentitySource, VoiceIdentity};

/// SQLite Profile Store
pub struct SqliteProfileStore {
    pool: DbPool,
}

impl SqliteProfileStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[derive(FromRow)]
struct IdentityRow {
    id: String,
    owner_id: Option<String>,
    source: String,
    reference_audio_location: String,
    created_at: String,
}

impl TryFrom<IdentityRow> for VoiceIdentity {
    type Error = RepositoryError;

    fn try_from(row: IdentityRow) -> Result<Self, Self::Error> {
        let id = Uuid::parse_str(&row.id)
            .map_err(|e| RepositoryError::SerializationError(e.to_string()))?;
        let owner_id = row
            .owner_id
            .map(|s| Uuid::parse_str(&s))
            .transpose()
            .map_err(|e| RepositoryError::SerializationError(e.to_string()))?;
        let source = IdentitySource::from_str(&row.source).ok_or_else(|| {
            RepositoryError::SerializationError(format!("unknown identity source: {}", row.source))
        })?;
        let created_at = DateTime::parse_from_rfc3339(&row.created_at)
            .map_err(|e| RepositoryError::SerializationError(e.to_string()))?
            .with_timezone(&Utc);

        VoiceIdentity::from_parts(
            IdentityId::from_uuid(id),
            owner_id,
            source,
            row.reference_audio_location,
            created_at,
        )
        .map_err(|e| RepositoryError::SerializationError(e.to_string()))
    }
}

#[async_trait]
impl ProfileStorePort for SqliteProfileStore {
    async fn current_identity(
        &self,
        owner_id: Uuid,
    ) -> Result<Option<VoiceIdentity>, RepositoryError> {
        let row: Option<IdentityRow> = sqlx::query_as(
            r#"
            SELECT vi.id, vi.owner_id, vi.source, vi.reference_audio_location, vi.created_at
            FROM profiles p
            JOIN voice_identities vi ON vi.id = p.current_identity_id
            WHERE p.owner_id = ?
            "#,
        )
        .bind(owner_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RepositoryError::DatabaseError(e.to_string()))?;

        row.map(VoiceIdentity::try_from).transpose()
    }

    async fn find_identity(
        &self,
        id: &IdentityId,
    ) -> Result<Option<VoiceIdentity>, RepositoryError> {
        let row: Option<IdentityRow> = sqlx::query_as(
            r#"
            SELECT id, owner_id, source, reference_audio_location, created_at
            FROM voice_identities
            WHERE id = ?
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RepositoryError::DatabaseError(e.to_string()))?;

        row.map(VoiceIdentity::try_from).transpose()
    }
}
