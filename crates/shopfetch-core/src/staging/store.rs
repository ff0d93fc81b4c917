//! Staging store: keyed tables with ordered integer scans
//!
//! Row shape is fixed across all modules: `{id, parent_id, data}` where
//! `data` is an opaque JSON-encoded payload. An empty `data` is a valid
//! "no enrichment" placeholder, not corruption. Ids are assigned by the
//! source API and unique per table; duplicate inserts violate the primary
//! key and surface as errors rather than being silently ignored.

use sqlx::{QueryBuilder, Row, SqlitePool};

use shopfetch_common::{PullError, Result};

/// Handle to one staging table. Cheap to clone; the name is fully qualified
/// with the run prefix and already identifier-validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagingTable {
    name: String,
}

impl StagingTable {
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// One staged row.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct StagedRow {
    pub id: i64,
    pub parent_id: Option<i64>,
    pub data: String,
}

impl StagedRow {
    pub fn new(id: i64, parent_id: Option<i64>, data: impl Into<String>) -> Self {
        Self {
            id,
            parent_id,
            data: data.into(),
        }
    }

    /// A placeholder row: valid id, no payload.
    pub fn gap(id: i64) -> Self {
        Self::new(id, None, "")
    }

    pub fn is_gap(&self) -> bool {
        self.data.is_empty()
    }
}

/// Staging store for one run.
#[derive(Debug, Clone)]
pub struct StagingStore {
    pool: SqlitePool,
    prefix: String,
}

impl StagingStore {
    pub fn new(pool: SqlitePool, prefix: impl Into<String>) -> Result<Self> {
        let prefix = prefix.into();
        validate_identifier(&prefix)?;
        Ok(Self { pool, prefix })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Handle for `{prefix}_{module}_{kind}`. Purely local: the table may
    /// not exist yet.
    pub fn table(&self, module: &str, kind: &str) -> Result<StagingTable> {
        validate_identifier(module)?;
        validate_identifier(kind)?;
        Ok(StagingTable {
            name: format!("{}_{}_{}", self.prefix, module, kind),
        })
    }

    /// Create the table (and its parent-id index) if missing.
    pub async fn create_table(&self, table: &StagingTable) -> Result<()> {
        sqlx::query(&format!(
            "CREATE TABLE IF NOT EXISTS {} (
                id INTEGER PRIMARY KEY,
                parent_id INTEGER,
                data TEXT NOT NULL DEFAULT ''
            )",
            table.name
        ))
        .execute(&self.pool)
        .await?;

        sqlx::query(&format!(
            "CREATE INDEX IF NOT EXISTS idx_{name}_parent ON {name} (parent_id)",
            name = table.name
        ))
        .execute(&self.pool)
        .await?;

        tracing::debug!(table = %table.name, "Staging table ready");
        Ok(())
    }

    /// Multi-row insert in the order given. Returns the raw sqlx error so
    /// the batch inserter can wrap it with table context.
    pub(crate) async fn insert_rows(
        &self,
        table: &StagingTable,
        rows: &[StagedRow],
    ) -> std::result::Result<(), sqlx::Error> {
        if rows.is_empty() {
            return Ok(());
        }

        let mut builder: QueryBuilder<sqlx::Sqlite> =
            QueryBuilder::new(format!("INSERT INTO {} (id, parent_id, data) ", table.name));
        builder.push_values(rows, |mut b, row| {
            b.push_bind(row.id)
                .push_bind(row.parent_id)
                .push_bind(&row.data);
        });
        builder.build().execute(&self.pool).await?;
        Ok(())
    }

    /// Point lookup by id.
    pub async fn find_by_id(&self, table: &StagingTable, id: i64) -> Result<Option<StagedRow>> {
        let row = sqlx::query_as::<_, StagedRow>(&format!(
            "SELECT id, parent_id, data FROM {} WHERE id = ?",
            table.name
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// All children of one parent, ordered by id.
    pub async fn find_by_parent(
        &self,
        table: &StagingTable,
        parent_id: i64,
    ) -> Result<Vec<StagedRow>> {
        let rows = sqlx::query_as::<_, StagedRow>(&format!(
            "SELECT id, parent_id, data FROM {} WHERE parent_id = ? ORDER BY id",
            table.name
        ))
        .bind(parent_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// First row with id strictly greater than `after`. The reassembly
    /// cursor's only read primitive.
    pub async fn next_after(
        &self,
        table: &StagingTable,
        after: i64,
    ) -> Result<Option<StagedRow>> {
        let row = sqlx::query_as::<_, StagedRow>(&format!(
            "SELECT id, parent_id, data FROM {} WHERE id > ? ORDER BY id LIMIT 1",
            table.name
        ))
        .bind(after)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn count(&self, table: &StagingTable) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table.name))
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Drop every table belonging to this run. Explicit-only: failure paths
    /// leave tables behind for external cleanup.
    pub async fn teardown(&self) -> Result<()> {
        let names: Vec<String> = sqlx::query(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name LIKE ? ESCAPE '\\'",
        )
        .bind(format!("{}\\_%", self.prefix.replace('_', "\\_")))
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(|r| r.get::<String, _>("name"))
        .collect();

        for name in names {
            sqlx::query(&format!("DROP TABLE IF EXISTS {}", name))
                .execute(&self.pool)
                .await?;
            tracing::debug!(table = %name, "Dropped staging table");
        }
        Ok(())
    }
}

/// Table-name fragments are interpolated into SQL; only identifier
/// characters may pass.
fn validate_identifier(s: &str) -> Result<()> {
    let valid = !s.is_empty()
        && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !s.starts_with(|c: char| c.is_ascii_digit());
    if valid {
        Ok(())
    } else {
        Err(PullError::Validation(format!(
            "Invalid staging identifier: {:?}",
            s
        )))
    }
}
