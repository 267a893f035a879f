use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{Mutex, RwLock};

use crate::config::{self, Config, SecretConfig, StorePaths};
use crate::markov::Markov;
use crate::repl::Repl;
use crate::utils::MessageCache;

/// Everything the event handler and the background loops share. The config
/// and markov documents sit behind their own locks; the command dispatcher
/// clones what it needs and releases them before doing network I/O.
pub struct BotState {
    pub config: RwLock<Config>,
    pub secret: RwLock<SecretConfig>,
    pub markov: RwLock<Markov>,
    pub cache: Mutex<MessageCache>,
    pub repl: Mutex<Option<Repl>>,
    pub paths: StorePaths,
    pub started_at: Instant,
}

pub type SharedState = Arc<BotState>;

impl BotState {
    pub fn new(
        config: Config,
        secret: SecretConfig,
        markov: Markov,
        paths: StorePaths,
    ) -> SharedState {
        Arc::new(Self {
            config: RwLock::new(config),
            secret: RwLock::new(secret),
            markov: RwLock::new(markov),
            cache: Mutex::new(MessageCache::new()),
            repl: Mutex::new(None),
            paths,
            started_at: Instant::now(),
        })
    }

    /// Persist all three documents with the current in-memory state.
    pub async fn save(&self) {
        let config = self.config.read().await;
        let markov = self.markov.read().await;
        let secret = self.secret.read().await;
        config::save_to_disk(&self.paths, &config, &markov, &secret);
    }

    pub fn backup(&self) {
        config::backup_on_disk(&self.paths);
    }

    pub async fn stop_repl(&self) {
        if let Some(repl) = self.repl.lock().await.take() {
            repl.stop();
        }
    }
}
