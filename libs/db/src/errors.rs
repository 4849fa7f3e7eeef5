//! Shared database error helpers (SQLSTATE / SQLite result code categorization).
//!
//! Lifecycle transactions that lose a race surface as one of a handful of
//! backend codes. Everything here answers one question: is it worth running
//! the whole transaction again?

/// Returns true if the given code represents a unique constraint violation
/// across popular backends (Postgres 23505, SQLite 2067 / 1555, MySQL 1062).
pub fn is_unique_violation_code(code: &str) -> bool {
    matches!(code, "23505" | "2067" | "1555" | "1062")
}

/// Returns true if the code means "another transaction got in the way".
///
/// Postgres: serialization failure, deadlock, lock not available.
/// SQLite: BUSY / LOCKED and their extended codes (recovery, snapshot,
/// shared cache, timeout).
pub fn is_conflict_code(code: &str) -> bool {
    matches!(
        code,
        "40001" | "40P01" | "55P03" | "5" | "6" | "261" | "262" | "517" | "773"
    )
}

/// Conflicts and unique violations both resolve on a fresh attempt: a second
/// concurrent insert of the same pair will observe the first one on retry.
pub fn is_retryable_code(code: &str) -> bool {
    is_conflict_code(code) || is_unique_violation_code(code)
}

pub fn is_sqlx_unique_violation(db: &dyn sqlx::error::DatabaseError) -> bool {
    db.code()
        .map(|c| is_unique_violation_code(c.as_ref()))
        .unwrap_or(false)
}

/// Classify a raw sqlx error.
pub fn is_sqlx_retryable(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => db
            .code()
            .map(|c| is_retryable_code(c.as_ref()))
            .unwrap_or(false),
        _ => false,
    }
}

#[cfg(feature = "sea-orm")]
fn runtime_err(err: &sea_orm::DbErr) -> Option<&sea_orm::RuntimeErr> {
    use sea_orm::DbErr;
    match err {
        DbErr::Conn(e) | DbErr::Exec(e) | DbErr::Query(e) => Some(e),
        _ => None,
    }
}

#[cfg(feature = "sea-orm")]
pub fn is_seaorm_unique_violation(err: &sea_orm::DbErr) -> bool {
    use sea_orm::RuntimeErr;
    match runtime_err(err) {
        Some(RuntimeErr::SqlxError(e)) => match e.as_database_error() {
            Some(db) => is_sqlx_unique_violation(db),
            None => false,
        },
        Some(RuntimeErr::Internal(msg)) => {
            let msg = msg.to_lowercase();
            msg.contains("unique") || msg.contains("duplicate")
        }
        None => false,
    }
}

#[cfg(feature = "sea-orm")]
pub fn is_seaorm_retryable(err: &sea_orm::DbErr) -> bool {
    use sea_orm::RuntimeErr;
    match runtime_err(err) {
        Some(RuntimeErr::SqlxError(e)) => is_sqlx_retryable(e),
        Some(RuntimeErr::Internal(msg)) => {
            let msg = msg.to_lowercase();
            msg.contains("database is locked") || msg.contains("deadlock")
        }
        None => false,
    }
}

/// Walk an `anyhow` chain looking for a retryable database error.
pub fn is_retryable_anyhow(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        #[cfg(feature = "sea-orm")]
        if let Some(db) = cause.downcast_ref::<sea_orm::DbErr>() {
            return is_seaorm_retryable(db);
        }
        match cause.downcast_ref::<sqlx::Error>() {
            Some(e) => is_sqlx_retryable(e),
            None => false,
        }
    })
}
