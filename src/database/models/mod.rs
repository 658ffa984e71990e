
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row};

/// A stored script with its metadata and embedding.
///
/// `path` is the natural key; re-seeding replaces the row in place.
/// `embedding` is `None` for a row that has never been embedded, which is
/// distinct from an explicit all-zero vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptRecord {
    pub id: i64,
    pub name: String,
    pub path: String,
    pub category: String,
    pub description: String,
    pub usage: String,
    pub tags: Vec<String>,
    pub dependencies: Vec<String>,
    pub embedding_text: String,
    pub embedding: Option<Vec<f32>>,
    pub tokens: i64,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct NewScript {
    pub name: String,
    pub path: String,
    pub category: String,
    pub description: String,
    pub usage: String,
    pub tags: Vec<String>,
    pub dependencies: Vec<String>,
    pub embedding_text: String,
    pub embedding: Option<Vec<f32>>,
    pub tokens: i64,
}

/// Partial update; `None` fields are left untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ScriptUpdate {
    pub name: Option<String>,
    pub category: Option<String>,
    pub description: Option<String>,
    pub usage: Option<String>,
    pub tags: Option<Vec<String>>,
    pub dependencies: Option<Vec<String>>,
    pub embedding_text: Option<String>,
    pub embedding: Option<Vec<f32>>,
    pub tokens: Option<i64>,
}

/// Filter and pagination for listing scripts. `limit: None` means no limit.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ListOptions {
    pub category: Option<String>,
    pub limit: Option<i64>,
    pub offset: i64,
}

// List and vector columns are stored as JSON text. The encoding stays
// behind this module; callers only ever see native Vecs.

pub(crate) fn encode_string_list(items: &[String]) -> serde_json::Result<String> {
    serde_json::to_string(items)
}

pub(crate) fn decode_string_list(raw: &str) -> serde_json::Result<Vec<String>> {
    serde_json::from_str(raw)
}

pub(crate) fn encode_embedding(vector: &[f32]) -> serde_json::Result<String> {
    serde_json::to_string(vector)
}

pub(crate) fn decode_embedding(raw: &str) -> serde_json::Result<Vec<f32>> {
    serde_json::from_str(raw)
}

fn column_decode(
    column: &str,
    source: serde_json::Error,
) -> sqlx::Error {
    sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: Box::new(source),
    }
}

impl FromRow<'_, SqliteRow> for ScriptRecord {
    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        let tags: String = row.try_get("tags")?;
        let dependencies: String = row.try_get("dependencies")?;
        let embedding: Option<String> = row.try_get("embedding")?;

        Ok(Self {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            path: row.try_get("path")?,
            category: row.try_get("category")?,
            description: row.try_get("description")?,
            usage: row.try_get("usage")?,
            tags: decode_string_list(&tags).map_err(|e| column_decode("tags", e))?,
            dependencies: decode_string_list(&dependencies)
                .map_err(|e| column_decode("dependencies", e))?,
            embedding_text: row.try_get("embedding_text")?,
            embedding: embedding
                .as_deref()
                .map(decode_embedding)
                .transpose()
                .map_err(|e| column_decode("embedding", e))?,
            tokens: row.try_get("tokens")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl ScriptRecord {
    /// Whether this record carries an embedding usable for similarity search.
    #[inline]
    pub fn has_embedding(&self) -> bool {
        self.embedding.as_ref().is_some_and(|v| !v.is_empty())
    }
}
