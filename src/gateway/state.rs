use std::sync::Arc;
use std::time::Duration;

use crate::db::Database;
use crate::transfer::TransferProcessor;

/// Gateway application state (shared)
#[derive(Clone)]
pub struct AppState {
    /// Batch processor (the coordinator in production)
    pub processor: Arc<dyn TransferProcessor>,
    /// PostgreSQL pool, pinged by `/health` when present
    pub database: Option<Arc<Database>>,
    /// Deadline given to every batch
    pub request_timeout: Duration,
}

impl AppState {
    pub fn new(processor: Arc<dyn TransferProcessor>, request_timeout: Duration) -> Self {
        Self {
            processor,
            database: None,
            request_timeout,
        }
    }

    pub fn with_database(mut self, database: Arc<Database>) -> Self {
        self.database = Some(database);
        self
    }
}
