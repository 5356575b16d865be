use crate::config::Config;
use crate::db::Db;
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Clone)]
pub struct AppState {
    pub db: Db,
    pub config: Arc<Config>,
    /// Serializes appends to the root-record chain so every record links to its
    /// immediate predecessor. Tree construction happens outside this lock.
    publish_lock: Arc<Mutex<()>>,
}

impl AppState {
    pub fn new(db: Db, config: Config) -> Self {
        Self {
            db,
            config: Arc::new(config),
            publish_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn publish_lock(&self) -> &Mutex<()> {
        &self.publish_lock
    }
}
