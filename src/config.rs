use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::commands::CommandRegistry;
use crate::error::Result;
use crate::markov::Markov;

pub const CONFIG_VERSION: u32 = 1;
pub const SECRET_CONFIG_VERSION: u32 = 1;

/// Wall-clock format for reminder timestamps. Lexicographic order on this
/// format matches chronological order, so reminders compare as plain strings.
pub const REMINDER_TIME_FORMAT: &str = "%Y-%m-%d %H:%M";

// Serialization of the three documents shares one best-effort lock. It keeps
// the autosave loop and the final shutdown save from interleaving writes; it
// makes no atomicity promise towards external readers.
static SAVE_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

/// On-disk locations of the persisted documents.
#[derive(Debug, Clone)]
pub struct StorePaths {
    pub config: PathBuf,
    pub secret: PathBuf,
    pub markov: PathBuf,
    pub pid: PathBuf,
}

impl Default for StorePaths {
    fn default() -> Self {
        Self {
            config: PathBuf::from("config.yaml"),
            secret: PathBuf::from("secret.yaml"),
            markov: PathBuf::from("markov.yaml"),
            pid: PathBuf::from("murmur.pid"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavingConfig {
    pub period_minutes: u64,
    pub backup: BackupConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupConfig {
    /// Every Nth autosave also refreshes the `.bak` copies.
    pub period: u64,
}

impl Default for SavingConfig {
    fn default() -> Self {
        Self {
            period_minutes: 10,
            backup: BackupConfig { period: 6 },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplConfig {
    pub port: u16,
}

impl Default for ReplConfig {
    fn default() -> Self {
        Self { port: 8980 }
    }
}

/// Per-guild channel allow-lists. The main `whitelist` gates all message
/// processing when `is_whitelisted` is set; the feature lists scope passive
/// behavior to explicitly opted-in channels.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GuildSettings {
    pub id: u64,
    pub is_whitelisted: bool,
    pub whitelist: HashSet<u64>,
    pub markov_logging_whitelist: HashSet<u64>,
    pub markov_responses_whitelist: HashSet<u64>,
    pub responses_whitelist: HashSet<u64>,
    pub reactions_whitelist: HashSet<u64>,
}

impl GuildSettings {
    pub fn new(id: u64) -> Self {
        Self {
            id,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    /// Negative levels ban the user from all command processing.
    pub permission_level: i64,
}

impl User {
    pub fn new(id: u64) -> Self {
        Self {
            id,
            permission_level: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reminder {
    pub time: String,
    pub message: String,
    pub channel_id: u64,
    pub ping_users: Vec<String>,
    pub whisper_users: Vec<u64>,
    /// Minutes until the reminder repeats; 0 means one-shot.
    pub repeat_after: i64,
}

impl Reminder {
    pub fn new(time: String, message: String, channel_id: u64) -> Self {
        Self {
            time,
            message,
            channel_id,
            ping_users: Vec::new(),
            whisper_users: Vec::new(),
            repeat_after: 0,
        }
    }
}

/// Passive reply: first matching regex answers with its text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub regex: String,
    pub text: String,
}

/// Passive reaction: every matching regex adds its emoji.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reaction {
    pub regex: String,
    pub emoji: String,
}

/// Monotonic id sequences for config-owned collections.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdSequences {
    pub reminder: u64,
    pub response: u64,
    pub reaction: u64,
}

impl IdSequences {
    pub fn next_reminder(&mut self) -> u64 {
        self.reminder += 1;
        self.reminder
    }

    pub fn next_response(&mut self) -> u64 {
        self.response += 1;
        self.response
    }

    pub fn next_reaction(&mut self) -> u64 {
        self.reaction += 1;
        self.reaction
    }
}

/// The whole mutable state of the bot, persisted as one YAML document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub version: u32,
    pub commands_prefix: String,
    pub saving: SavingConfig,
    pub repl: ReplConfig,
    pub commands: CommandRegistry,
    pub guilds: HashMap<u64, GuildSettings>,
    pub users: HashMap<u64, User>,
    pub responses: BTreeMap<u64, Response>,
    pub reactions: BTreeMap<u64, Reaction>,
    pub reminders: BTreeMap<u64, Reminder>,
    pub ids: IdSequences,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            commands_prefix: "!".to_string(),
            saving: SavingConfig::default(),
            repl: ReplConfig::default(),
            commands: CommandRegistry::default(),
            guilds: HashMap::new(),
            users: HashMap::new(),
            responses: BTreeMap::new(),
            reactions: BTreeMap::new(),
            reminders: BTreeMap::new(),
            ids: IdSequences::default(),
        }
    }
}

impl Config {
    /// Whether messages from this channel are processed at all.
    pub fn is_channel_active(&self, guild_id: u64, channel_id: u64) -> bool {
        match self.guilds.get(&guild_id) {
            Some(guild) => !guild.is_whitelisted || guild.whitelist.contains(&channel_id),
            None => true,
        }
    }
}

/// Authentication material, kept out of the main config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecretConfig {
    pub version: u32,
    pub token: Option<String>,
}

impl Default for SecretConfig {
    fn default() -> Self {
        Self {
            version: SECRET_CONFIG_VERSION,
            token: None,
        }
    }
}

/// Read one persisted document. A missing file is not an error (the caller
/// falls back to defaults); a file that exists but does not parse is.
pub fn load_document<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    Ok(Some(serde_yaml::from_str(&raw)?))
}

/// Compare a persisted document version against the one this build requires.
pub fn check_version(name: &str, actual: u32, required: u32) -> bool {
    if actual == required {
        return true;
    }
    error!(
        "{} version mismatch: found {}, required {} (migrate or remove the file)",
        name, actual, required
    );
    false
}

/// Write all three documents. Failures are logged and skipped so a transient
/// disk problem never takes the bot down; the next save overwrites.
pub fn save_to_disk(paths: &StorePaths, config: &Config, markov: &Markov, secret: &SecretConfig) {
    let _guard = SAVE_LOCK.lock();
    debug!("saving configuration");
    write_document(&paths.config, config);
    write_document(&paths.markov, markov);
    write_document(&paths.secret, secret);
    info!("configuration saved");
}

fn write_document<T: Serialize>(path: &Path, document: &T) {
    let serialized = match serde_yaml::to_string(document) {
        Ok(serialized) => serialized,
        Err(e) => {
            error!("failed to serialize {}: {}", path.display(), e);
            return;
        }
    };
    if let Err(e) = std::fs::write(path, serialized) {
        error!("failed to write {}: {}", path.display(), e);
    }
}

/// Refresh the `.bak` siblings of the config and markov documents from their
/// current on-disk contents.
pub fn backup_on_disk(paths: &StorePaths) {
    let _guard = SAVE_LOCK.lock();
    for path in [&paths.config, &paths.markov] {
        if !path.exists() {
            continue;
        }
        let backup = path.with_extension("yaml.bak");
        match std::fs::copy(path, &backup) {
            Ok(_) => debug!("backed up {} to {}", path.display(), backup.display()),
            Err(e) => error!("failed to back up {}: {}", path.display(), e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_round_trips_through_yaml() {
        let mut config = Config::default();
        config.guilds.insert(1, GuildSettings::new(1));
        config.users.insert(2, User::new(2));
        config
            .reminders
            .insert(config.ids.next_reminder(), Reminder::new(
                "2026-01-01 10:00".to_string(),
                "happy new year".to_string(),
                42,
            ));

        let yaml = serde_yaml::to_string(&config).unwrap();
        let parsed: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed.version, CONFIG_VERSION);
        assert_eq!(parsed.commands_prefix, "!");
        assert!(parsed.guilds.contains_key(&1));
        assert_eq!(parsed.reminders.len(), 1);
    }

    #[test]
    fn channel_gating_follows_guild_whitelist() {
        let mut config = Config::default();
        let mut guild = GuildSettings::new(1);
        assert!(config.is_channel_active(1, 10));

        guild.is_whitelisted = true;
        guild.whitelist.insert(10);
        config.guilds.insert(1, guild);

        assert!(config.is_channel_active(1, 10));
        assert!(!config.is_channel_active(1, 11));
        // Unknown guilds are treated as unrestricted.
        assert!(config.is_channel_active(2, 11));
    }

    #[test]
    fn version_gate_rejects_mismatches() {
        assert!(check_version("config", CONFIG_VERSION, CONFIG_VERSION));
        assert!(!check_version("config", CONFIG_VERSION + 1, CONFIG_VERSION));
    }

    #[test]
    fn missing_document_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let loaded: Option<Config> = load_document(&dir.path().join("absent.yaml")).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn corrupt_document_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, ":\n  - not config").unwrap();
        let loaded: Result<Option<Config>> = load_document(&path);
        assert!(loaded.is_err());
    }

    #[test]
    fn save_and_backup_write_expected_files() {
        let dir = tempfile::tempdir().unwrap();
        let paths = StorePaths {
            config: dir.path().join("config.yaml"),
            secret: dir.path().join("secret.yaml"),
            markov: dir.path().join("markov.yaml"),
            pid: dir.path().join("murmur.pid"),
        };

        save_to_disk(
            &paths,
            &Config::default(),
            &Markov::default(),
            &SecretConfig::default(),
        );
        assert!(paths.config.exists());
        assert!(paths.secret.exists());
        assert!(paths.markov.exists());

        backup_on_disk(&paths);
        assert!(paths.config.with_extension("yaml.bak").exists());
        assert!(paths.markov.with_extension("yaml.bak").exists());

        let reloaded: Option<Config> = load_document(&paths.config).unwrap();
        assert_eq!(reloaded.unwrap().version, CONFIG_VERSION);
    }

    #[test]
    fn reminder_time_format_orders_lexicographically() {
        let earlier = "2026-08-07 09:30".to_string();
        let later = "2026-08-07 10:00".to_string();
        assert!(earlier < later);
        assert!("2025-12-31 23:59".to_string() < earlier);
    }
}
