//! Application state shared by all handlers.

use depot_services::FileService;
use sqlx::PgPool;

#[derive(Clone)]
pub struct AppState {
    pub files: FileService,
    /// Ledger database, used by the health check.
    pub db_pool: PgPool,
}
