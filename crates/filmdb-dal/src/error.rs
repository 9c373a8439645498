pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Database migration error: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),

    #[error("Record not found: {0}")]
    RecordNotFound(String),

    #[error("Failed update of record {id}, version {version} is not current")]
    FailedUpdate { id: i64, version: i32 },

    #[error("Invalid order by field: {0}")]
    InvalidOrderByField(String),
}
