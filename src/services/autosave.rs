use tokio::time::Duration;
use tracing::debug;

use crate::state::SharedState;

/// Periodic config persistence. Saves on every tick; every Nth tick also
/// refreshes the on-disk backups first.
pub struct AutosaveService {
    state: SharedState,
}

impl AutosaveService {
    pub fn new(state: SharedState) -> Self {
        Self { state }
    }

    pub fn spawn(self) {
        tokio::spawn(self.run());
    }

    async fn run(self) {
        let mut index: u64 = 1;
        loop {
            let (period_minutes, backup_period) = {
                let cfg = self.state.config.read().await;
                (
                    cfg.saving.period_minutes.max(1),
                    cfg.saving.backup.period.max(1),
                )
            };
            if index % backup_period == 0 {
                self.state.backup();
            }
            self.state.save().await;
            debug!("autosave iteration {} finished", index);
            index += 1;
            tokio::time::sleep(Duration::from_secs(period_minutes * 60)).await;
        }
    }
}
