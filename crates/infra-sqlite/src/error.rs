// sqlx -> AppError mapping

use wotc_core::error::AppError;

/// Map sqlx errors to AppError with SQLite result-code context
///
/// Codes: https://www.sqlite.org/rescode.html
pub(crate) fn map_sqlx_error(err: sqlx::Error) -> AppError {
    match &err {
        sqlx::Error::Database(db_err) => match db_err.code() {
            Some(code) => match code.as_ref() {
                // UNIQUE / PRIMARY KEY
                "2067" | "1555" => AppError::Conflict(format!(
                    "Unique constraint violation: {} ({})",
                    db_err.message(),
                    code
                )),
                "787" | "3850" => AppError::Database(format!(
                    "Foreign key constraint violation: {} ({})",
                    db_err.message(),
                    code
                )),
                "5" => AppError::Database(format!(
                    "Database locked (SQLITE_BUSY): {}",
                    db_err.message()
                )),
                "13" => AppError::Database(format!("Database full: {}", db_err.message())),
                other => AppError::Database(format!(
                    "Database error [{}]: {}",
                    other,
                    db_err.message()
                )),
            },
            None => AppError::Database(format!("Database error: {}", db_err.message())),
        },
        sqlx::Error::RowNotFound => AppError::NotFound("row not found".to_string()),
        sqlx::Error::PoolTimedOut => {
            AppError::Database("Connection pool timeout (all connections busy)".to_string())
        }
        sqlx::Error::PoolClosed => AppError::Database("Connection pool closed".to_string()),
        _ => AppError::Database(err.to_string()),
    }
}
