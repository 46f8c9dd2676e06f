use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable overriding `store.base_dir`.
pub const ENV_BASE_DIR: &str = "FLIGHTDB_BASE_DIR";
/// Environment variable overriding `knowledge.path`.
pub const ENV_KNOWLEDGE_BASE: &str = "FLIGHTDB_KNOWLEDGE_BASE";
/// Environment variable overriding `store.journal_mode`.
pub const ENV_JOURNAL_MODE: &str = "FLIGHTDB_JOURNAL_MODE";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub knowledge: KnowledgeConfig,
}

// ── Store ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoreConfig {
    /// Directory holding one database file per session
    #[serde(default = "default_base_dir")]
    pub base_dir: PathBuf,
    /// Extension of session database files (without the dot)
    #[serde(default = "default_file_extension")]
    pub file_extension: String,
    /// How long a statement waits on a locked database before failing
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    #[serde(default)]
    pub journal_mode: JournalMode,
    /// Load existing tables into the catalog when a session is opened.
    /// When off, the catalog starts empty and relies on `CREATE TABLE IF NOT EXISTS`.
    #[serde(default = "default_true")]
    pub hydrate_catalog: bool,
    /// Coerce numeric cells to the declared column type before inserting
    /// into an already-known table
    #[serde(default)]
    pub coerce_to_declared_types: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            base_dir: default_base_dir(),
            file_extension: default_file_extension(),
            busy_timeout_ms: default_busy_timeout_ms(),
            journal_mode: JournalMode::default(),
            hydrate_catalog: true,
            coerce_to_declared_types: false,
        }
    }
}

/// SQLite journal mode applied to every session connection.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum JournalMode {
    #[default]
    Wal,
    Delete,
}

impl JournalMode {
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "WAL",
            Self::Delete => "DELETE",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "wal" => Some(Self::Wal),
            "delete" => Some(Self::Delete),
            _ => None,
        }
    }
}

// ── Knowledge base ───────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct KnowledgeConfig {
    /// Markdown file with one `### MESSAGE_NAME` section per message type
    #[serde(default)]
    pub path: Option<PathBuf>,
}

fn default_base_dir() -> PathBuf {
    PathBuf::from("flight_data")
}
fn default_file_extension() -> String {
    "db".into()
}
fn default_busy_timeout_ms() -> u64 {
    5000
}
fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration from `path`, falling back to defaults when the file
    /// does not exist, then apply environment overrides.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            Self::from_toml(&contents)
                .with_context(|| format!("Failed to parse config file {}", path.display()))?
        } else {
            tracing::debug!("config file {} not found, using defaults", path.display());
            Self::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Apply environment variable overrides to config
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary variable source.
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup(ENV_BASE_DIR).filter(|v| !v.trim().is_empty()) {
            self.store.base_dir = PathBuf::from(dir);
        }

        if let Some(path) = lookup(ENV_KNOWLEDGE_BASE).filter(|v| !v.trim().is_empty()) {
            self.knowledge.path = Some(PathBuf::from(path));
        }

        if let Some(mode) = lookup(ENV_JOURNAL_MODE) {
            match JournalMode::parse(&mode) {
                Some(parsed) => self.store.journal_mode = parsed,
                None => tracing::warn!("ignoring unknown {ENV_JOURNAL_MODE} value '{mode}'"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn empty_toml_yields_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.store.base_dir, PathBuf::from("flight_data"));
        assert_eq!(config.store.file_extension, "db");
        assert!(config.store.hydrate_catalog);
        assert!(!config.store.coerce_to_declared_types);
        assert!(config.knowledge.path.is_none());
    }

    #[test]
    fn partial_toml_keeps_other_defaults() {
        let config = Config::from_toml(
            r#"
            [store]
            base_dir = "/var/lib/flights"
            journal_mode = "delete"

            [knowledge]
            path = "kb/messages.md"
            "#,
        )
        .unwrap();

        assert_eq!(config.store.base_dir, PathBuf::from("/var/lib/flights"));
        assert_eq!(config.store.journal_mode, JournalMode::Delete);
        assert_eq!(config.store.busy_timeout_ms, 5000);
        assert_eq!(
            config.knowledge.path.as_deref(),
            Some(Path::new("kb/messages.md"))
        );
    }

    #[test]
    fn unknown_journal_mode_is_a_parse_error() {
        let err = Config::from_toml("[store]\njournal_mode = \"memory\"").unwrap_err();
        assert!(err.to_string().contains("journal_mode") || err.to_string().contains("variant"));
    }

    #[test]
    fn load_missing_file_uses_defaults() {
        let tmp = tempfile::TempDir::new().unwrap();
        let config = Config::load(&tmp.path().join("absent.toml")).unwrap();
        assert_eq!(config.store.file_extension, "db");
    }

    #[test]
    fn load_reads_file_from_disk() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("flightdb.toml");
        fs::write(&path, "[store]\nfile_extension = \"sqlite\"\nbusy_timeout_ms = 250\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.store.file_extension, "sqlite");
        assert_eq!(config.store.busy_timeout_ms, 250);
    }

    #[test]
    fn load_reports_malformed_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("broken.toml");
        fs::write(&path, "[store\nbase_dir = ").unwrap();

        let err = Config::load(&path).unwrap_err();
        assert!(format!("{err:#}").contains("Failed to parse config file"));
    }

    #[test]
    fn overrides_replace_file_values() {
        let vars: HashMap<&str, &str> = HashMap::from([
            (ENV_BASE_DIR, "/tmp/override"),
            (ENV_KNOWLEDGE_BASE, "/tmp/kb.md"),
            (ENV_JOURNAL_MODE, "DELETE"),
        ]);
        let mut config = Config::default();
        config.apply_overrides_from(|key| vars.get(key).map(|v| (*v).to_string()));

        assert_eq!(config.store.base_dir, PathBuf::from("/tmp/override"));
        assert_eq!(config.knowledge.path, Some(PathBuf::from("/tmp/kb.md")));
        assert_eq!(config.store.journal_mode, JournalMode::Delete);
    }

    #[test]
    fn blank_or_invalid_overrides_are_ignored() {
        let vars: HashMap<&str, &str> =
            HashMap::from([(ENV_BASE_DIR, "  "), (ENV_JOURNAL_MODE, "turbo")]);
        let mut config = Config::default();
        config.apply_overrides_from(|key| vars.get(key).map(|v| (*v).to_string()));

        assert_eq!(config, Config::default());
    }
}
