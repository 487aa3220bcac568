use std::time::Instant;

use crate::db::Db;

#[derive(Clone)]
pub struct AppState {
    pub db: Db,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(db: Db) -> Self {
        Self {
            db,
            start_time: Instant::now(),
        }
    }
}
