use crate::error::StorageError;
use crate::{CatalogDb, CatalogRelation, ColumnInfo};
use async_trait::async_trait;
use catalogchat_core::config::CatalogConfig;
use catalogchat_core::error::Result;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use tracing::{debug, info};

/// Statement prefixes the agent is allowed to execute
const ALLOWED_PREFIXES: &[&str] = &["select", "with"];

/// Keywords that make a statement a write or DDL, rejected outright
const FORBIDDEN_KEYWORDS: &[&str] = &[
    "insert", "update", "delete", "drop", "alter", "create", "truncate", "grant", "revoke",
    "copy", "vacuum",
];

/// Postgres client scoped to the searchable slice of the catalog
pub(crate) struct PostgresCatalogDb {
    pool: PgPool,
    schema: String,
    searchable_patterns: Vec<String>,
}

impl PostgresCatalogDb {
    /// Connect to the catalog database with the provided configuration
    pub async fn new(config: &CatalogConfig) -> Result<Self> {
        info!("Connecting to catalog database");

        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(&config.database_url)
            .await
            .map_err(|e| StorageError::ConnectionFailed(e.to_string()))?;

        Ok(Self {
            pool,
            schema: config.schema.clone(),
            searchable_patterns: config.searchable_patterns.clone(),
        })
    }

    /// Reject anything that is not a single read-only statement
    fn validate_statement(sql: &str) -> Result<()> {
        let normalized = sql.trim().trim_end_matches(';').to_lowercase();

        if normalized.contains(';') {
            return Err(StorageError::RejectedStatement(
                "multiple statements are not allowed".to_string(),
            )
            .into());
        }

        if !ALLOWED_PREFIXES.iter().any(|p| normalized.starts_with(p)) {
            return Err(StorageError::RejectedStatement(
                "only SELECT statements are allowed".to_string(),
            )
            .into());
        }

        for keyword in FORBIDDEN_KEYWORDS {
            if normalized
                .split(|c: char| !c.is_ascii_alphanumeric() && c != '_')
                .any(|word| word == *keyword)
            {
                return Err(StorageError::RejectedStatement(format!(
                    "statement contains forbidden keyword '{keyword}'"
                ))
                .into());
            }
        }

        Ok(())
    }
}

#[async_trait]
impl CatalogDb for PostgresCatalogDb {
    async fn list_searchable_relations(&self) -> Result<Vec<CatalogRelation>> {
        let rows = sqlx::query(
            "SELECT table_name, table_type FROM information_schema.tables \
             WHERE table_schema = $1 AND table_name LIKE ANY($2) \
             ORDER BY table_name",
        )
        .bind(&self.schema)
        .bind(&self.searchable_patterns)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::BackendError(format!("Failed to list relations: {e}")))?;

        let relations = rows
            .iter()
            .map(|row| {
                Ok(CatalogRelation {
                    name: row
                        .try_get("table_name")
                        .map_err(|e| StorageError::BackendError(e.to_string()))?,
                    kind: row
                        .try_get("table_type")
                        .map_err(|e| StorageError::BackendError(e.to_string()))?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        debug!("Discovered {} searchable relation(s)", relations.len());
        Ok(relations)
    }

    async fn describe_relation(&self, name: &str) -> Result<Vec<ColumnInfo>> {
        let rows = sqlx::query(
            "SELECT column_name, data_type FROM information_schema.columns \
             WHERE table_schema = $1 AND table_name = $2 \
             ORDER BY ordinal_position",
        )
        .bind(&self.schema)
        .bind(name)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::BackendError(format!("Failed to describe '{name}': {e}")))?;

        rows.iter()
            .map(|row| {
                Ok(ColumnInfo {
                    name: row
                        .try_get("column_name")
                        .map_err(|e| StorageError::BackendError(e.to_string()))?,
                    data_type: row
                        .try_get("data_type")
                        .map_err(|e| StorageError::BackendError(e.to_string()))?,
                })
            })
            .collect()
    }

    async fn execute_select(&self, sql: &str) -> Result<String> {
        Self::validate_statement(sql)?;

        // Wrapping in json_agg lets arbitrary result shapes come back
        // as one text column.
        let wrapped = format!(
            "SELECT COALESCE(json_agg(row_to_json(t)), '[]'::json)::text \
             FROM ({}) t",
            sql.trim().trim_end_matches(';')
        );

        let rows_json: String = sqlx::query_scalar(&wrapped)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StorageError::BackendError(format!("Query execution failed: {e}")))?;

        Ok(rows_json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_accepts_select() {
        assert!(PostgresCatalogDb::validate_statement("SELECT * FROM catalog_objects").is_ok());
        assert!(PostgresCatalogDb::validate_statement(
            "WITH x AS (SELECT 1) SELECT * FROM x"
        )
        .is_ok());
        assert!(PostgresCatalogDb::validate_statement("select 1;").is_ok());
    }

    #[test]
    fn test_validate_rejects_writes() {
        assert!(PostgresCatalogDb::validate_statement("DELETE FROM catalog_objects").is_err());
        assert!(
            PostgresCatalogDb::validate_statement("SELECT 1; DROP TABLE catalog_objects").is_err()
        );
        assert!(PostgresCatalogDb::validate_statement(
            "SELECT * FROM t WHERE x = 1 UNION SELECT 2; update t set x = 3"
        )
        .is_err());
    }

    #[test]
    fn test_validate_rejects_embedded_keyword_statement() {
        assert!(PostgresCatalogDb::validate_statement("TRUNCATE catalog_objects").is_err());
    }

    #[test]
    fn test_validate_allows_keyword_inside_identifier() {
        // "created_at" contains "create" as a substring but not as a word
        assert!(PostgresCatalogDb::validate_statement(
            "SELECT created_at FROM catalog_objects"
        )
        .is_ok());
    }
}
