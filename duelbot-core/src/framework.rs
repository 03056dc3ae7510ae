//! Shared plumbing for database-backed processors.

use sqlx::PgPool;

/// Entry point for ledger queries.
///
/// Every query type implements `kanau::processor::Processor` for this
/// struct, so callers hold one cheap clone and dispatch typed requests.
#[derive(Clone)]
pub struct DatabaseProcessor {
    pub pool: PgPool,
}

impl DatabaseProcessor {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}
