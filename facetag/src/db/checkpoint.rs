//! Checkpoint store
//!
//! Key/value registry scoped by tag space. Keys:
//! - `cursor`: listing cursor of the last fully processed page
//! - `last_modified_watermark`: RFC 3339 timestamp of the last completed walk
//! - `template_id`: cached metadata template id
//! - `identity:<id>`: lower-cased display name of an enrolled identity

use crate::types::{Checkpoint, Cursor, IdentityId, TemplateId};
use chrono::{DateTime, Utc};
use facetag_common::{Error, Result};
use sqlx::{Executor, Sqlite, SqlitePool};

const KEY_CURSOR: &str = "cursor";
const KEY_WATERMARK: &str = "last_modified_watermark";
const KEY_TEMPLATE_ID: &str = "template_id";
const IDENTITY_PREFIX: &str = "identity:";

/// Durable resume state and identity mapping for one tag space
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    db: SqlitePool,
    tag_space: String,
}

impl CheckpointStore {
    pub fn new(db: SqlitePool, tag_space: impl Into<String>) -> Self {
        Self {
            db,
            tag_space: tag_space.into(),
        }
    }

    pub fn tag_space(&self) -> &str {
        &self.tag_space
    }

    /// Load cursor and watermark
    pub async fn load(&self) -> Result<Checkpoint> {
        let cursor = self.get_value(KEY_CURSOR).await?.map(Cursor::new);
        let last_modified_watermark = self.watermark().await?;
        Ok(Checkpoint {
            cursor,
            last_modified_watermark,
        })
    }

    pub async fn cursor(&self) -> Result<Option<Cursor>> {
        Ok(self.get_value(KEY_CURSOR).await?.map(Cursor::new))
    }

    /// Replace the persisted cursor
    pub async fn save_cursor(&self, cursor: &Cursor) -> Result<()> {
        set_value(&self.db, &self.tag_space, KEY_CURSOR, cursor.as_str()).await
    }

    pub async fn clear_cursor(&self) -> Result<()> {
        delete_value(&self.db, &self.tag_space, KEY_CURSOR).await
    }

    pub async fn watermark(&self) -> Result<Option<DateTime<Utc>>> {
        match self.get_value(KEY_WATERMARK).await? {
            Some(raw) => DateTime::parse_from_rfc3339(&raw)
                .map(|t| Some(t.with_timezone(&Utc)))
                .map_err(|e| Error::InvalidInput(format!("Stored watermark {:?}: {}", raw, e))),
            None => Ok(None),
        }
    }

    /// Record a completed walk: advance the watermark and drop the cursor
    ///
    /// Both writes happen in one transaction. The watermark never moves
    /// backwards; the value actually stored is returned.
    pub async fn complete_walk(&self, watermark: DateTime<Utc>) -> Result<DateTime<Utc>> {
        let current = self.watermark().await?;
        let effective = match current {
            Some(existing) if existing > watermark => {
                tracing::warn!(
                    existing = %existing.to_rfc3339(),
                    proposed = %watermark.to_rfc3339(),
                    "Watermark would move backwards, keeping existing value"
                );
                existing
            }
            _ => watermark,
        };

        let mut tx = self.db.begin().await?;
        set_value(&mut *tx, &self.tag_space, KEY_WATERMARK, &effective.to_rfc3339()).await?;
        delete_value(&mut *tx, &self.tag_space, KEY_CURSOR).await?;
        tx.commit().await?;

        Ok(effective)
    }

    pub async fn template_id(&self) -> Result<Option<TemplateId>> {
        Ok(self.get_value(KEY_TEMPLATE_ID).await?.map(TemplateId::new))
    }

    pub async fn set_template_id(&self, template_id: &TemplateId) -> Result<()> {
        set_value(&self.db, &self.tag_space, KEY_TEMPLATE_ID, template_id.as_str()).await
    }

    /// Display name registered for an identity
    pub async fn display_name(&self, identity: &IdentityId) -> Result<Option<String>> {
        self.get_value(&identity_key(identity)).await
    }

    /// Map an identity to its display name (stored lower-cased)
    pub async fn set_display_name(&self, identity: &IdentityId, display_name: &str) -> Result<()> {
        set_value(
            &self.db,
            &self.tag_space,
            &identity_key(identity),
            &display_name.to_lowercase(),
        )
        .await
    }

    /// All enrolled identities, ordered by id
    pub async fn identities(&self) -> Result<Vec<(IdentityId, String)>> {
        let rows: Vec<(String, String)> = sqlx::query_as(
            "SELECT key, value FROM checkpoint_kv WHERE tag_space = ? AND key LIKE ? ORDER BY key",
        )
        .bind(&self.tag_space)
        .bind(format!("{}%", IDENTITY_PREFIX))
        .fetch_all(&self.db)
        .await?;

        Ok(rows
            .into_iter()
            .filter_map(|(key, value)| {
                key.strip_prefix(IDENTITY_PREFIX)
                    .map(|id| (IdentityId::new(id), value))
            })
            .collect())
    }

    async fn get_value(&self, key: &str) -> Result<Option<String>> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT value FROM checkpoint_kv WHERE tag_space = ? AND key = ?")
                .bind(&self.tag_space)
                .bind(key)
                .fetch_optional(&self.db)
                .await
                .map_err(Error::Database)?;

        Ok(row.map(|(value,)| value))
    }
}

fn identity_key(identity: &IdentityId) -> String {
    format!("{}{}", IDENTITY_PREFIX, identity.as_str())
}

async fn set_value<'e, E>(executor: E, tag_space: &str, key: &str, value: &str) -> Result<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        "INSERT INTO checkpoint_kv (tag_space, key, value) VALUES (?, ?, ?)
         ON CONFLICT(tag_space, key) DO UPDATE SET value = excluded.value",
    )
    .bind(tag_space)
    .bind(key)
    .bind(value)
    .execute(executor)
    .await
    .map_err(Error::Database)?;

    Ok(())
}

async fn delete_value<'e, E>(executor: E, tag_space: &str, key: &str) -> Result<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query("DELETE FROM checkpoint_kv WHERE tag_space = ? AND key = ?")
        .bind(tag_space)
        .bind(key)
        .execute(executor)
        .await
        .map_err(Error::Database)?;

    Ok(())
}
