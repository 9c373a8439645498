use std::collections::{BTreeMap, HashSet};

use filmdb_types::Runtime;
use futures::{StreamExt as _, TryStreamExt as _};
use garde::Validate;
use serde::{Deserialize, Serialize};
use sqlx::{Acquire as _, Row as _, types::Json};
use time::OffsetDateTime;
use tracing::debug;

use crate::{Batch, ChosenDB, ChosenRow, Error, ListingParams, MAX_LIMIT, error::Result};

pub const MIN_YEAR: i32 = 1888;
pub const MAX_TITLE_BYTES: usize = 500;
pub const MAX_GENRES: usize = 5;

const VALID_ORDER_FIELDS: &[&str] = &["id", "title", "year", "runtime", "created_at"];

/// Data validation depends on current date, it's injected as context,
/// so validation is repeatable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationContext {
    pub current_year: i32,
}

impl ValidationContext {
    pub fn now() -> Self {
        Self::for_year(OffsetDateTime::now_utc().year())
    }

    pub const fn for_year(current_year: i32) -> Self {
        Self { current_year }
    }
}

impl Default for ValidationContext {
    fn default() -> Self {
        Self::now()
    }
}

fn validate_title(title: &str, _ctx: &ValidationContext) -> garde::Result {
    if title.is_empty() {
        Err(garde::Error::new("must be provided"))
    } else if title.len() > MAX_TITLE_BYTES {
        Err(garde::Error::new("must not be more than 500 bytes long"))
    } else {
        Ok(())
    }
}

fn validate_year(year: &i32, ctx: &ValidationContext) -> garde::Result {
    if *year == 0 {
        Err(garde::Error::new("must be provided"))
    } else if *year < MIN_YEAR {
        Err(garde::Error::new("must be greater than 1888"))
    } else if *year > ctx.current_year {
        Err(garde::Error::new("must not be in the future"))
    } else {
        Ok(())
    }
}

fn validate_runtime(runtime: &Runtime, _ctx: &ValidationContext) -> garde::Result {
    match runtime.minutes() {
        0 => Err(garde::Error::new("must be provided")),
        m if m < 0 => Err(garde::Error::new("must be a positive integer")),
        _ => Ok(()),
    }
}

fn validate_genres(genres: &Option<Vec<String>>, _ctx: &ValidationContext) -> garde::Result {
    let Some(genres) = genres else {
        return Err(garde::Error::new("must be provided"));
    };
    if genres.is_empty() {
        Err(garde::Error::new("must contain at least 1 genre"))
    } else if genres.len() > MAX_GENRES {
        Err(garde::Error::new("must not contain more than 5 genres"))
    } else if !is_unique(genres) {
        Err(garde::Error::new("must not contain duplicate values"))
    } else {
        Ok(())
    }
}

fn is_unique(values: &[String]) -> bool {
    let mut seen = HashSet::with_capacity(values.len());
    values.iter().all(|v| seen.insert(v.as_str()))
}

/// Field name -> message, at most one message per field
pub type Violations = BTreeMap<String, String>;

pub fn violations(report: &garde::Report) -> Violations {
    report
        .iter()
        .map(|(path, error)| (path.to_string(), error.message().to_string()))
        .collect()
}

/// Checks all rules and returns all problems found, empty result means valid candidate
pub fn validate_movie<T>(candidate: &T, ctx: &ValidationContext) -> Violations
where
    T: Validate<Context = ValidationContext>,
{
    match candidate.validate_with(ctx) {
        Ok(()) => Violations::new(),
        Err(report) => violations(&report),
    }
}

// Missing fields get zero values, so they are reported by validation rather than by decoding
#[derive(Debug, Serialize, Deserialize, Clone, Default, Validate)]
#[garde(context(ValidationContext))]
pub struct CreateMovie {
    #[serde(default)]
    #[garde(custom(validate_title))]
    pub title: String,
    #[serde(default)]
    #[garde(custom(validate_year))]
    pub year: i32,
    #[serde(default)]
    #[garde(custom(validate_runtime))]
    pub runtime: Runtime,
    #[serde(default)]
    #[garde(custom(validate_genres))]
    pub genres: Option<Vec<String>>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, Validate)]
#[garde(context(ValidationContext))]
pub struct UpdateMovie {
    #[serde(default)]
    #[garde(custom(validate_title))]
    pub title: String,
    #[serde(default)]
    #[garde(custom(validate_year))]
    pub year: i32,
    #[serde(default)]
    #[garde(custom(validate_runtime))]
    pub runtime: Runtime,
    #[serde(default)]
    #[garde(custom(validate_genres))]
    pub genres: Option<Vec<String>>,
    /// Version the client has seen, if present update succeeds only if it's still current
    #[serde(default)]
    #[garde(range(min = 1))]
    pub version: Option<i32>,
}

impl From<CreateMovie> for UpdateMovie {
    fn from(value: CreateMovie) -> Self {
        UpdateMovie {
            title: value.title,
            year: value.year,
            runtime: value.runtime,
            genres: value.genres,
            version: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Movie {
    pub id: i64,
    pub created_at: OffsetDateTime,
    pub title: String,
    pub year: i32,
    pub runtime: Runtime,
    pub genres: Vec<String>,
    pub version: i32,
}

fn int_column(row: &ChosenRow, name: &str) -> Result<i32, sqlx::Error> {
    let value: i64 = row.try_get(name)?;
    i32::try_from(value).map_err(|e| sqlx::Error::ColumnDecode {
        index: name.to_string(),
        source: Box::new(e),
    })
}

impl sqlx::FromRow<'_, ChosenRow> for Movie {
    fn from_row(row: &ChosenRow) -> Result<Self, sqlx::Error> {
        let Json(genres) = row.try_get::<Json<Vec<String>>, _>("genres")?;
        Ok(Movie {
            id: row.try_get("id")?,
            created_at: row.try_get("created_at")?,
            title: row.try_get("title")?,
            year: int_column(row, "year")?,
            runtime: int_column(row, "runtime")?.into(),
            genres,
            version: int_column(row, "version")?,
        })
    }
}

const INSERT_CMD: &str = r#"
INSERT INTO movie (created_at, title, year, runtime, genres, version)
VALUES (?, ?, ?, ?, ?, 1)
RETURNING id, created_at, title, year, runtime, genres, version
"#;

const UPDATE_CMD: &str = r#"
UPDATE movie SET title = ?, year = ?, runtime = ?, genres = ?, version = version + 1
WHERE id = ?
RETURNING id, created_at, title, year, runtime, genres, version
"#;

const UPDATE_VERSIONED_CMD: &str = r#"
UPDATE movie SET title = ?, year = ?, runtime = ?, genres = ?, version = version + 1
WHERE id = ? AND version = ?
RETURNING id, created_at, title, year, runtime, genres, version
"#;

const SELECT_ONE_QUERY: &str =
    "SELECT id, created_at, title, year, runtime, genres, version FROM movie WHERE id = ?";

fn not_found() -> Error {
    Error::RecordNotFound("Movie".to_string())
}

pub type MovieRepository = MovieRepositoryImpl<sqlx::Pool<ChosenDB>>;

pub struct MovieRepositoryImpl<E> {
    executor: E,
}

impl<'c, E> MovieRepositoryImpl<E>
where
    for<'a> &'a E:
        sqlx::Executor<'c, Database = ChosenDB> + sqlx::Acquire<'c, Database = ChosenDB>,
{
    pub fn new(executor: E) -> Self {
        Self { executor }
    }

    /// Stores new movie, payload must be validated before
    pub async fn create(&self, payload: CreateMovie) -> Result<Movie> {
        let record = sqlx::query_as::<_, Movie>(INSERT_CMD)
            .bind(OffsetDateTime::now_utc())
            .bind(&payload.title)
            .bind(payload.year)
            .bind(payload.runtime.minutes())
            .bind(Json(payload.genres.unwrap_or_default()))
            .fetch_one(&self.executor)
            .await?;
        debug!("Created movie {}", record.id);
        Ok(record)
    }

    pub async fn get(&self, id: i64) -> Result<Movie> {
        if id < 1 {
            return Err(not_found());
        }
        get(id, &self.executor).await?.ok_or_else(not_found)
    }

    /// Updates all mutable fields and increments version.
    ///
    /// If payload contains version, update is done only if stored record has still the same version,
    /// otherwise [`Error::FailedUpdate`] is returned.
    pub async fn update(&self, id: i64, payload: UpdateMovie) -> Result<Movie> {
        if id < 1 {
            return Err(not_found());
        }
        let mut conn = self.executor.acquire().await?;
        let mut transaction = conn.begin().await?;

        let query = match payload.version {
            Some(version) => sqlx::query_as::<_, Movie>(UPDATE_VERSIONED_CMD)
                .bind(&payload.title)
                .bind(payload.year)
                .bind(payload.runtime.minutes())
                .bind(Json(payload.genres.as_deref().unwrap_or_default()))
                .bind(id)
                .bind(version),
            None => sqlx::query_as::<_, Movie>(UPDATE_CMD)
                .bind(&payload.title)
                .bind(payload.year)
                .bind(payload.runtime.minutes())
                .bind(Json(payload.genres.as_deref().unwrap_or_default()))
                .bind(id),
        };
        let updated = query.fetch_optional(&mut *transaction).await?;

        match (updated, payload.version) {
            (Some(record), _) => {
                transaction.commit().await?;
                debug!("Updated movie {} to version {}", record.id, record.version);
                Ok(record)
            }
            (None, Some(version)) => {
                let current = get(id, &mut *transaction).await?;
                transaction.rollback().await?;
                match current {
                    Some(current) => {
                        debug!(
                            "Movie {id} has version {}, update expected {version}",
                            current.version
                        );
                        Err(Error::FailedUpdate { id, version })
                    }
                    None => Err(not_found()),
                }
            }
            (None, None) => Err(not_found()),
        }
    }

    pub async fn delete(&self, id: i64) -> Result<()> {
        if id < 1 {
            return Err(not_found());
        }
        let res = sqlx::query("DELETE FROM movie WHERE id = ?")
            .bind(id)
            .execute(&self.executor)
            .await?;

        if res.rows_affected() == 0 {
            Err(not_found())
        } else {
            debug!("Deleted movie {id}");
            Ok(())
        }
    }

    pub async fn count(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT count(*) FROM movie")
            .fetch_one(&self.executor)
            .await?;
        Ok(count.max(0) as u64)
    }

    pub async fn list(&self, params: ListingParams) -> Result<Batch<Movie>> {
        // id as last criterion keeps pages stable
        let order = params.order_by(VALID_ORDER_FIELDS, "id")?;
        let rows = sqlx::query_as::<_, Movie>(&format!(
            "SELECT id, created_at, title, year, runtime, genres, version FROM movie ORDER BY {order} LIMIT ? OFFSET ?"
        ))
        .bind(params.limit)
        .bind(params.offset)
        .fetch(&self.executor)
        .take(MAX_LIMIT)
        .try_collect::<Vec<_>>()
        .await?;
        let total = self.count().await?;

        Ok(Batch {
            offset: params.offset,
            limit: params.limit,
            rows,
            total,
        })
    }
}

async fn get<'c, E>(id: i64, executor: E) -> Result<Option<Movie>>
where
    E: sqlx::Executor<'c, Database = ChosenDB>,
{
    let record = sqlx::query_as::<_, Movie>(SELECT_ONE_QUERY)
        .bind(id)
        .fetch_optional(executor)
        .await?;
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;

    const YEAR: i32 = 2024;

    fn ctx() -> ValidationContext {
        ValidationContext::for_year(YEAR)
    }

    fn valid_movie() -> CreateMovie {
        CreateMovie {
            title: "Ju Dou".to_string(),
            year: 1990,
            runtime: Runtime::new(95),
            genres: Some(vec!["drama".to_string(), "romance".to_string()]),
        }
    }

    #[test]
    fn test_valid_movie() {
        let violations = validate_movie(&valid_movie(), &ctx());
        assert!(violations.is_empty(), "Unexpected violations {violations:?}");
    }

    #[test]
    fn test_all_fields_reported() {
        let movie = CreateMovie::default();
        let violations = validate_movie(&movie, &ctx());
        assert_eq!(violations.len(), 4);
        for field in ["title", "year", "runtime", "genres"] {
            assert_eq!(violations.get(field).unwrap(), "must be provided");
        }
    }

    #[test]
    fn test_title() {
        let mut movie = valid_movie();
        movie.title = "x".repeat(MAX_TITLE_BYTES);
        assert!(validate_movie(&movie, &ctx()).is_empty());

        // multibyte characters count in bytes
        movie.title = "č".repeat(MAX_TITLE_BYTES / 2 + 1);
        let violations = validate_movie(&movie, &ctx());
        assert_eq!(
            violations.get("title").unwrap(),
            "must not be more than 500 bytes long"
        );
    }

    #[test]
    fn test_year_limits() {
        let check = |year: i32| {
            let movie = CreateMovie {
                year,
                ..valid_movie()
            };
            validate_movie(&movie, &ctx()).remove("year")
        };
        assert_eq!(check(YEAR), None);
        assert_eq!(check(MIN_YEAR), None);
        assert_eq!(check(YEAR + 1).unwrap(), "must not be in the future");
        assert_eq!(check(MIN_YEAR - 1).unwrap(), "must be greater than 1888");
        assert_eq!(check(-1).unwrap(), "must be greater than 1888");
    }

    #[test]
    fn test_year_depends_on_context() {
        let movie = CreateMovie {
            year: YEAR + 1,
            ..valid_movie()
        };
        assert!(validate_movie(&movie, &ctx()).contains_key("year"));
        assert!(validate_movie(&movie, &ValidationContext::for_year(YEAR + 1)).is_empty());
    }

    #[test]
    fn test_runtime() {
        let movie = CreateMovie {
            runtime: Runtime::new(-5),
            ..valid_movie()
        };
        let violations = validate_movie(&movie, &ctx());
        assert_eq!(violations.len(), 1);
        assert_eq!(
            violations.get("runtime").unwrap(),
            "must be a positive integer"
        );
    }

    #[test]
    fn test_genres() {
        let check = |genres: &[&str]| {
            let movie = CreateMovie {
                genres: Some(genres.iter().map(|g| g.to_string()).collect()),
                ..valid_movie()
            };
            validate_movie(&movie, &ctx()).remove("genres")
        };

        assert_eq!(
            check(&["a", "a"]).unwrap(),
            "must not contain duplicate values"
        );
        assert_eq!(
            check(&["a", "b", "c", "d", "e", "f"]).unwrap(),
            "must not contain more than 5 genres"
        );
        assert_eq!(check(&[]).unwrap(), "must contain at least 1 genre");
        assert_eq!(check(&["a", "b", "c", "d", "e"]), None);
        // equality is case sensitive
        assert_eq!(check(&["Drama", "drama"]), None);
    }

    #[test]
    fn test_update_version() {
        let mut movie: UpdateMovie = valid_movie().into();
        assert!(validate_movie(&movie, &ctx()).is_empty());
        movie.version = Some(0);
        assert!(validate_movie(&movie, &ctx()).contains_key("version"));
    }

    #[test]
    fn test_missing_fields_decode() {
        let movie: CreateMovie =
            serde_json::from_str(r#"{"title": "Moana", "runtime": "107 mins"}"#).unwrap();
        assert_eq!(movie.runtime, Runtime::new(107));
        assert_eq!(movie.year, 0);
        assert!(movie.genres.is_none());
        let violations = validate_movie(&movie, &ctx());
        assert_eq!(
            violations.keys().map(String::as_str).collect::<Vec<_>>(),
            vec!["genres", "year"]
        );
    }
}
