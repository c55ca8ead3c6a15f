use std::{str::FromStr, sync::Arc};

use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::info;

use crate::{
    config::Backend,
    error::AppError,
    repository::{DynRepository, PostgresRepository, SqliteRepository},
};

const MAX_CONNECTIONS: u32 = 10;

pub async fn init_sqlite_pool(database_url: &str) -> Result<SqlitePool, AppError> {
    let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(MAX_CONNECTIONS)
        .connect_with(options)
        .await?;
    Ok(pool)
}

pub async fn init_pg_pool(database_url: &str) -> Result<PgPool, AppError> {
    let pool = PgPoolOptions::new()
        .max_connections(MAX_CONNECTIONS)
        .connect(database_url)
        .await?;
    Ok(pool)
}

/// Opens the pool for `backend`, applies its migrations and wraps it in
/// the matching repository.
pub async fn connect(backend: Backend, database_url: &str) -> Result<DynRepository, AppError> {
    match backend {
        Backend::Sqlite => {
            let pool = init_sqlite_pool(database_url).await?;
            sqlx::migrate!("./migrations/sqlite")
                .run(&pool)
                .await
                .map_err(|err| AppError::Other(err.into()))?;
            info!("connected to sqlite database");
            Ok(Arc::new(SqliteRepository::new(pool)))
        }
        Backend::Postgres => {
            let pool = init_pg_pool(database_url).await?;
            sqlx::migrate!("./migrations/postgres")
                .run(&pool)
                .await
                .map_err(|err| AppError::Other(err.into()))?;
            info!("connected to postgres database");
            Ok(Arc::new(PostgresRepository::new(pool)))
        }
    }
}
