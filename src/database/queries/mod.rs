
use anyhow::Context;
use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

use super::models::{
    ListOptions, NewScript, ScriptRecord, ScriptUpdate, encode_embedding, encode_string_list,
};
use crate::{Result, ScriptSearchError};

const SCRIPT_COLUMNS: &str = "id, name, path, category, description, usage, tags, dependencies, \
                              embedding_text, embedding, tokens, created_at, updated_at";

pub struct ScriptQueries;

impl ScriptQueries {
    /// Insert a new script row. Fails on a duplicate `path`; bulk seeding
    /// goes through [`Self::upsert`] instead.
    #[inline]
    pub async fn create(pool: &SqlitePool, new_script: NewScript) -> Result<ScriptRecord> {
        validate_new(&new_script)?;

        let now = Utc::now();
        let tags = encode_string_list(&new_script.tags).context("Failed to encode tags")?;
        let dependencies = encode_string_list(&new_script.dependencies)
            .context("Failed to encode dependencies")?;
        let embedding = encode_optional_embedding(new_script.embedding.as_deref())?;

        let id = sqlx::query(
            "INSERT INTO scripts (name, path, category, description, usage, tags, dependencies, \
             embedding_text, embedding, tokens, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&new_script.name)
        .bind(&new_script.path)
        .bind(&new_script.category)
        .bind(&new_script.description)
        .bind(&new_script.usage)
        .bind(&tags)
        .bind(&dependencies)
        .bind(&new_script.embedding_text)
        .bind(&embedding)
        .bind(new_script.tokens)
        .bind(now)
        .bind(now)
        .execute(pool)
        .await?
        .last_insert_rowid();

        Self::get_by_id(pool, id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Failed to retrieve created script").into())
    }

    /// Insert-or-replace keyed on the unique `path`. A replaced row keeps
    /// its `id` and `created_at`; `updated_at` is refreshed.
    #[inline]
    pub async fn upsert(pool: &SqlitePool, new_script: NewScript) -> Result<ScriptRecord> {
        validate_new(&new_script)?;

        let now = Utc::now();
        let tags = encode_string_list(&new_script.tags).context("Failed to encode tags")?;
        let dependencies = encode_string_list(&new_script.dependencies)
            .context("Failed to encode dependencies")?;
        let embedding = encode_optional_embedding(new_script.embedding.as_deref())?;

        sqlx::query(
            "INSERT INTO scripts (name, path, category, description, usage, tags, dependencies, \
             embedding_text, embedding, tokens, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT(path) DO UPDATE SET \
                 name = excluded.name, \
                 category = excluded.category, \
                 description = excluded.description, \
                 usage = excluded.usage, \
                 tags = excluded.tags, \
                 dependencies = excluded.dependencies, \
                 embedding_text = excluded.embedding_text, \
                 embedding = excluded.embedding, \
                 tokens = excluded.tokens, \
                 updated_at = excluded.updated_at",
        )
        .bind(&new_script.name)
        .bind(&new_script.path)
        .bind(&new_script.category)
        .bind(&new_script.description)
        .bind(&new_script.usage)
        .bind(&tags)
        .bind(&dependencies)
        .bind(&new_script.embedding_text)
        .bind(&embedding)
        .bind(new_script.tokens)
        .bind(now)
        .bind(now)
        .execute(pool)
        .await?;

        Self::get_by_path(pool, &new_script.path)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Failed to retrieve upserted script").into())
    }

    #[inline]
    pub async fn get_by_id(pool: &SqlitePool, id: i64) -> Result<Option<ScriptRecord>> {
        let query = format!("SELECT {SCRIPT_COLUMNS} FROM scripts WHERE id = ?");
        let result = sqlx::query_as::<_, ScriptRecord>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await?;

        Ok(result)
    }

    #[inline]
    pub async fn get_by_path(pool: &SqlitePool, path: &str) -> Result<Option<ScriptRecord>> {
        let query = format!("SELECT {SCRIPT_COLUMNS} FROM scripts WHERE path = ?");
        let result = sqlx::query_as::<_, ScriptRecord>(&query)
            .bind(path)
            .fetch_optional(pool)
            .await?;

        Ok(result)
    }

    /// Apply a partial update. Set fields are written in one statement and
    /// `updated_at` is always refreshed.
    #[inline]
    pub async fn update(
        pool: &SqlitePool,
        id: i64,
        update: ScriptUpdate,
    ) -> Result<Option<ScriptRecord>> {
        if id <= 0 {
            return Err(ScriptSearchError::InvalidId(id));
        }

        let mut query_parts = Vec::new();
        let mut query_values = Vec::new();

        if let Some(name) = update.name {
            query_parts.push("name = ?");
            query_values.push(name);
        }

        if let Some(category) = update.category {
            query_parts.push("category = ?");
            query_values.push(category);
        }

        if let Some(description) = update.description {
            query_parts.push("description = ?");
            query_values.push(description);
        }

        if let Some(usage) = update.usage {
            query_parts.push("usage = ?");
            query_values.push(usage);
        }

        if let Some(tags) = update.tags {
            query_parts.push("tags = ?");
            query_values.push(encode_string_list(&tags).context("Failed to encode tags")?);
        }

        if let Some(dependencies) = update.dependencies {
            query_parts.push("dependencies = ?");
            query_values.push(
                encode_string_list(&dependencies).context("Failed to encode dependencies")?,
            );
        }

        if let Some(embedding_text) = update.embedding_text {
            query_parts.push("embedding_text = ?");
            query_values.push(embedding_text);
        }

        if let Some(embedding) = update.embedding {
            query_parts.push("embedding = ?");
            query_values
                .push(encode_embedding(&embedding).context("Failed to encode embedding")?);
        }

        if let Some(tokens) = update.tokens {
            query_parts.push("tokens = ?");
            query_values.push(tokens.to_string());
        }

        if query_parts.is_empty() {
            return Self::get_by_id(pool, id).await;
        }

        query_parts.push("updated_at = ?");
        query_values.push(Utc::now().naive_utc().to_string());

        let query_str = format!("UPDATE scripts SET {} WHERE id = ?", query_parts.join(", "));

        let mut query = sqlx::query(&query_str);
        for value in query_values {
            query = query.bind(value);
        }
        query = query.bind(id);

        query.execute(pool).await?;

        Self::get_by_id(pool, id).await
    }

    #[inline]
    pub async fn delete(pool: &SqlitePool, id: i64) -> Result<bool> {
        if id <= 0 {
            return Err(ScriptSearchError::InvalidId(id));
        }

        let result = sqlx::query("DELETE FROM scripts WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// List scripts with optional category filter and pagination, both
    /// pushed into the query. Default order is category, name, id, stable
    /// across calls so offset pagination does not skip rows.
    #[inline]
    pub async fn list(pool: &SqlitePool, options: &ListOptions) -> Result<Vec<ScriptRecord>> {
        // SQLite treats a negative LIMIT as "no limit".
        let limit = options.limit.unwrap_or(-1);

        let scripts = if let Some(category) = &options.category {
            let query = format!(
                "SELECT {SCRIPT_COLUMNS} FROM scripts WHERE category = ? \
                 ORDER BY category, name, id LIMIT ? OFFSET ?"
            );
            sqlx::query_as::<_, ScriptRecord>(&query)
                .bind(category)
                .bind(limit)
                .bind(options.offset)
                .fetch_all(pool)
                .await?
        } else {
            let query = format!(
                "SELECT {SCRIPT_COLUMNS} FROM scripts \
                 ORDER BY category, name, id LIMIT ? OFFSET ?"
            );
            sqlx::query_as::<_, ScriptRecord>(&query)
                .bind(limit)
                .bind(options.offset)
                .fetch_all(pool)
                .await?
        };

        debug!("Listed {} scripts", scripts.len());
        Ok(scripts)
    }

    #[inline]
    pub async fn count(pool: &SqlitePool, category: Option<&str>) -> Result<i64> {
        let count = if let Some(category) = category {
            sqlx::query_scalar("SELECT COUNT(*) FROM scripts WHERE category = ?")
                .bind(category)
                .fetch_one(pool)
                .await?
        } else {
            sqlx::query_scalar("SELECT COUNT(*) FROM scripts")
                .fetch_one(pool)
                .await?
        };

        Ok(count)
    }

    #[inline]
    pub async fn list_categories(pool: &SqlitePool) -> Result<Vec<String>> {
        let categories =
            sqlx::query_scalar("SELECT DISTINCT category FROM scripts ORDER BY category")
                .fetch_all(pool)
                .await?;

        Ok(categories)
    }
}

fn validate_new(new_script: &NewScript) -> Result<()> {
    if new_script.name.trim().is_empty() {
        return Err(ScriptSearchError::Validation("name is required".to_string()));
    }
    if new_script.path.trim().is_empty() {
        return Err(ScriptSearchError::Validation("path is required".to_string()));
    }
    if new_script.category.trim().is_empty() {
        return Err(ScriptSearchError::Validation(
            "category is required".to_string(),
        ));
    }
    Ok(())
}

fn encode_optional_embedding(embedding: Option<&[f32]>) -> Result<Option<String>> {
    embedding
        .map(|vector| encode_embedding(vector).context("Failed to encode embedding"))
        .transpose()
        .map_err(Into::into)
}
