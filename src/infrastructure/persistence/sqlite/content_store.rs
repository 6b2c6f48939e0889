//! SQLite Content Store
//!
//! 内容记录的声音上下文读取与渲染位置写回。
//! 写回用单条带守卫的 UPDATE 完成，并发下不会互相覆盖

use async_trait::async_trait;
use sqlx::FromRow;
use uuid::Uuid;

use super::DbPool;
use crate::application::ports::{
    ContentStorePort, ContentVoiceContext, PersistOutcome, RepositoryError,
};
use crate::domain::voice::IdentityId;

/// SQLite Content Store
pub struct SqliteContentStore {
    pool: DbPool,
}

impl SqliteContentStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[derive(FromRow)]
struct ContentRow {
    id: String,
    owner_id: Option<String>,
    voice_identity_id: Option<String>,
    audio_location: Option<String>,
}

impl TryFrom<ContentRow> for ContentVoiceContext {
    type Error = RepositoryError;

    fn try_from(row: ContentRow) -> Result<Self, Self::Error> {
        let content_id = Uuid::parse_str(&row.id)
            .map_err(|e| RepositoryError::SerializationError(e.to_string()))?;
        let owner_id = row
            .owner_id
            .map(|s| Uuid::parse_str(&s))
            .transpose()
            .map_err(|e| RepositoryError::SerializationError(e.to_string()))?;
        let identity_id = row
            .voice_identity_id
            .map(|s| Uuid::parse_str(&s))
            .transpose()
            .map_err(|e| RepositoryError::SerializationError(e.to_string()))?
            .map(IdentityId::from_uuid);

        Ok(ContentVoiceContext {
            content_id,
            owner_id,
            identity_id,
            audio_location: row.audio_location,
        })
    }
}

#[async_trait]
impl ContentStorePort for SqliteContentStore {
    async fn voice_context(
        &self,
        content_id: Uuid,
    ) -> Result<Option<ContentVoiceContext>, RepositoryError> {
        let row: Option<ContentRow> = sqlx::query_as(
            r#"
            SELECT id, owner_id, voice_identity_id, audio_location
            FROM content_records
            WHERE id = ?
            "#,
        )
        .bind(content_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RepositoryError::DatabaseError(e.to_string()))?;

        row.map(ContentVoiceContext::try_from).transpose()
    }

    async fn attach_rendering(
        &self,
        content_id: Uuid,
        identity_id: Option<&IdentityId>,
        audio_location: &str,
    ) -> Result<PersistOutcome, RepositoryError> {
        // 守卫条件全部进同一条语句: 位置未设置,且身份匹配或记录无身份。
        // identity 为 NULL 时 `voice_identity_id = NULL` 永假,
        // 只剩 IS NULL 分支,语义正好是 "记录无身份才允许兜底写回"
        let result = sqlx::query(
            r#"
            UPDATE content_records
            SET audio_location = ?
            WHERE id = ?
              AND audio_location IS NULL
              AND (voice_identity_id IS NULL OR voice_identity_id = ?)
            "#,
        )
        .bind(audio_location)
        .bind(content_id.to_string())
        .bind(identity_id.map(|id| id.to_string()))
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::DatabaseError(e.to_string()))?;

        if result.rows_affected() > 0 {
            return Ok(PersistOutcome::Attached);
        }

        // 没写进去,查一次当前状态给出跳过原因
        match self.voice_context(content_id).await? {
            None => Ok(PersistOutcome::SkippedMissingRecord),
            Some(ctx) if ctx.audio_location.is_some() => Ok(PersistOutcome::SkippedAlreadySet),
            Some(_) => Ok(PersistOutcome::SkippedIdentityMismatch),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::persistence::sqlite::{create_pool, run_migrations, DatabaseConfig};
    use chrono::Utc;

    async fn test_pool() -> DbPool {
        let pool = create_pool(&DatabaseConfig::in_memory()).await.unwrap();
        run_migrations(&pool).await.unwrap();
        pool
    }

    async fn insert_content(
        pool: &DbPool,
        content_id: Uuid,
        owner_id: Option<Uuid>,
        identity_id: Option<&IdentityId>,
        audio_location: Option<&str>,
    ) {
        // content_records.voice_identity_id 有外键约束,先补齐父行
        if let Some(identity) = identity_id {
            sqlx::query(
                r#"
                INSERT OR IGNORE INTO voice_identities (id, owner_id, source, reference_audio_location, created_at)
                VALUES (?, NULL, 'anonymous', 'ab/ref.wav', ?)
                "#,
            )
            .bind(identity.to_string())
            .bind(Utc::now().to_rfc3339())
            .execute(pool)
            .await
            .unwrap();
        }
        sqlx::query(
            r#"
            INSERT INTO content_records (id, owner_id, voice_identity_id, audio_location, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(content_id.to_string())
        .bind(owner_id.map(|o| o.to_string()))
        .bind(identity_id.map(|i| i.to_string()))
        .bind(audio_location)
        .bind(Utc::now().to_rfc3339())
        .execute(pool)
        .await
        .unwrap();
    }

    async fn stored_location(pool: &DbPool, content_id: Uuid) -> Option<String> {
        sqlx::query_scalar("SELECT audio_location FROM content_records WHERE id = ?")
            .bind(content_id.to_string())
            .fetch_one(pool)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_attach_writes_once() {
        let pool = test_pool().await;
        let store = SqliteContentStore::new(pool.clone());
        let content_id = Uuid::new_v4();
        let identity = IdentityId::new();

        insert_content(&pool, content_id, Some(Uuid::new_v4()), Some(&identity), None).await;

        let first = store
            .attach_rendering(content_id, Some(&identity), "ab/a.wav")
            .await
            .unwrap();
        assert_eq!(first, PersistOutcome::Attached);

        // 已有渲染的记录不再被覆盖
        let second = store
            .attach_rendering(content_id, Some(&identity), "cd/b.wav")
            .await
            .unwrap();
        assert_eq!(second, PersistOutcome::SkippedAlreadySet);
        assert_eq!(stored_location(&pool, content_id).await.as_deref(), Some("ab/a.wav"));
    }

    #[tokio::test]
    async fn test_identity_mismatch_leaves_record_unchanged() {
        let pool = test_pool().await;
        let store = SqliteContentStore::new(pool.clone());
        let content_id = Uuid::new_v4();
        let recorded = IdentityId::new();
        let other = IdentityId::new();

        insert_content(&pool, content_id, Some(Uuid::new_v4()), Some(&recorded), None).await;

        let outcome = store
            .attach_rendering(content_id, Some(&other), "ab/a.wav")
            .await
            .unwrap();
        assert_eq!(outcome, PersistOutcome::SkippedIdentityMismatch);
        assert_eq!(stored_location(&pool, content_id).await, None);
    }

    #[tokio::test]
    async fn test_identityless_record_accepts_any_rendering() {
        let pool = test_pool().await;
        let store = SqliteContentStore::new(pool.clone());

        // 记录无身份,克隆身份的渲染可以写回
        let with_identity = Uuid::new_v4();
        insert_content(&pool, with_identity, None, None, None).await;
        let outcome = store
            .attach_rendering(with_identity, Some(&IdentityId::new()), "ab/a.wav")
            .await
            .unwrap();
        assert_eq!(outcome, PersistOutcome::Attached);

        // 记录无身份,兜底声音的渲染同样可以
        let with_fallback = Uuid::new_v4();
        insert_content(&pool, with_fallback, None, None, None).await;
        let outcome = store
            .attach_rendering(with_fallback, None, "cd/b.wav")
            .await
            .unwrap();
        assert_eq!(outcome, PersistOutcome::Attached);
    }

    #[tokio::test]
    async fn test_fallback_cannot_overwrite_identity_record() {
        let pool = test_pool().await;
        let store = SqliteContentStore::new(pool.clone());
        let content_id = Uuid::new_v4();
        let recorded = IdentityId::new();

        insert_content(&pool, content_id, Some(Uuid::new_v4()), Some(&recorded), None).await;

        let outcome = store
            .attach_rendering(content_id, None, "ab/a.wav")
            .await
            .unwrap();
        assert_eq!(outcome, PersistOutcome::SkippedIdentityMismatch);
        assert_eq!(stored_location(&pool, content_id).await, None);
    }

    #[tokio::test]
    async fn test_missing_record_is_reported() {
        let pool = test_pool().await;
        let store = SqliteContentStore::new(pool);

        let outcome = store
            .attach_rendering(Uuid::new_v4(), None, "ab/a.wav")
            .await
            .unwrap();
        assert_eq!(outcome, PersistOutcome::SkippedMissingRecord);
    }

    #[tokio::test]
    async fn test_voice_context_reads_all_fields() {
        let pool = test_pool().await;
        let store = SqliteContentStore::new(pool.clone());
        let content_id = Uuid::new_v4();
        let owner = Uuid::new_v4();
        let identity = IdentityId::new();

        insert_content(&pool, content_id, Some(owner), Some(&identity), Some("ab/a.wav")).await;

        let ctx = store.voice_context(content_id).await.unwrap().unwrap();
        assert_eq!(ctx.content_id, content_id);
        assert_eq!(ctx.owner_id, Some(owner));
        assert_eq!(ctx.identity_id.as_ref(), Some(&identity));
        assert_eq!(ctx.audio_location.as_deref(), Some("ab/a.wav"));

        assert!(store.voice_context(Uuid::new_v4()).await.unwrap().is_none());
    }
}
