pub mod error;
pub mod movie;

use std::{fmt::Display, str::FromStr};

pub use error::Error;
pub use sqlx::Error as SqlxError;
use sqlx::sqlite::SqlitePoolOptions;

use crate::error::Result;

pub type ChosenDB = sqlx::Sqlite;
pub type ChosenRow = sqlx::sqlite::SqliteRow;
pub type Pool = sqlx::Pool<ChosenDB>;

pub const MAX_LIMIT: usize = 10_000;
const MAX_SORT_FIELD_LEN: usize = 100;

pub async fn new_pool(database_url: &str, max_connections: u32) -> Result<Pool, Error> {
    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await?;
    Ok(pool)
}

/// Brings database schema up to date, migrations are embedded in the binary
pub async fn migrate(pool: &Pool) -> Result<()> {
    sqlx::migrate!("../../migrations").run(pool).await?;
    Ok(())
}

/// Single sort criterion, textual form is `field`, `+field` or `-field` (descending)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub field: String,
    pub descending: bool,
}

impl SortKey {
    pub fn asc(field: impl Into<String>) -> Self {
        SortKey {
            field: field.into(),
            descending: false,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        SortKey {
            field: field.into(),
            descending: true,
        }
    }

    /// Parses comma separated keys like `title,-year`
    pub fn parse_list(keys: &str) -> Result<Vec<SortKey>> {
        keys.split(',').map(str::parse).collect()
    }
}

impl FromStr for SortKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let key = match s.strip_prefix('-') {
            Some(field) => SortKey::desc(field),
            None => SortKey::asc(s.strip_prefix('+').unwrap_or(s)),
        };
        if key.field.is_empty() || key.field.len() > MAX_SORT_FIELD_LEN {
            return Err(Error::InvalidOrderByField(s.to_string()));
        }
        Ok(key)
    }
}

impl Display for SortKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.field)?;
        if self.descending {
            f.write_str(" DESC")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ListingParams {
    pub offset: i64,
    pub limit: i64,
    pub sort: Vec<SortKey>,
}

impl Default for ListingParams {
    fn default() -> Self {
        ListingParams::new(0, MAX_LIMIT as i64)
    }
}

impl ListingParams {
    pub fn new(offset: i64, limit: i64) -> Self {
        ListingParams {
            offset,
            limit,
            sort: Vec::new(),
        }
    }

    pub fn sorted_by(self, sort: Vec<SortKey>) -> Self {
        ListingParams { sort, ..self }
    }

    /// ORDER BY clause from allowed fields only, `tie_breaker` is always the last criterion
    pub fn order_by(&self, allowed: &[&str], tie_breaker: &str) -> Result<String> {
        let mut clause = Vec::with_capacity(self.sort.len() + 1);
        for key in &self.sort {
            if !allowed.contains(&key.field.as_str()) {
                return Err(Error::InvalidOrderByField(key.field.clone()));
            }
            clause.push(key.to_string());
        }
        clause.push(tie_breaker.to_string());
        Ok(clause.join(", "))
    }
}

/// One page of records together with total number of records available
#[derive(Debug, Clone)]
pub struct Batch<T> {
    pub offset: i64,
    pub limit: i64,
    pub rows: Vec<T>,
    pub total: u64,
}
