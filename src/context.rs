use crate::config::Config;
use crate::db::DbPool;
use crate::fanout::FanoutManager;
use crate::queue::WorkQueue;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Application context containing shared dependencies
/// This reduces parameter passing and makes it easier to add new dependencies
#[derive(Clone)]
pub struct AppContext {
    pub db_pool: DbPool,
    pub queue: Arc<Mutex<WorkQueue>>,
    pub fanout: Arc<FanoutManager>,
    pub config: Arc<Config>,
}

impl AppContext {
    pub fn new(
        db_pool: DbPool,
        queue: Arc<Mutex<WorkQueue>>,
        fanout: Arc<FanoutManager>,
        config: Arc<Config>,
    ) -> Self {
        Self {
            db_pool,
            queue,
            fanout,
            config,
        }
    }
}
