use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const MIN_PANE_RATIO: f64 = 0.1;
pub const DEFAULT_PANE_RATIOS: [f64; 3] = [1.0 / 3.0, 1.0 / 3.0, 1.0 / 3.0];

#[derive(Debug, Clone)]
pub struct Config {
    pub base_dir: PathBuf,
    /// Directory holding the issue database.
    pub data_dir: PathBuf,
}

/// Persisted filter state for the Task List.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterPrefs {
    #[serde(default)]
    pub search_query: String,
    #[serde(default)]
    pub sort_mode: SortMode,
    #[serde(default)]
    pub type_filter: Option<String>,
    #[serde(default)]
    pub include_closed: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortMode {
    #[default]
    Priority,
    Created,
    Updated,
    Id,
}

impl SortMode {
    pub fn next(self) -> Self {
        match self {
            SortMode::Priority => SortMode::Created,
            SortMode::Created => SortMode::Updated,
            SortMode::Updated => SortMode::Id,
            SortMode::Id => SortMode::Priority,
        }
    }

    /// The TDQ `sort:` argument this mode stands for; `None` is the store's natural order.
    pub fn sort_token(self) -> Option<&'static str> {
        match self {
            SortMode::Priority => None,
            SortMode::Created => Some("-created"),
            SortMode::Updated => Some("-updated"),
            SortMode::Id => Some("id"),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SortMode::Priority => "priority",
            SortMode::Created => "created",
            SortMode::Updated => "updated",
            SortMode::Id => "id",
        }
    }
}

/// On-disk config file (~/.tdmon/config.toml).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default = "default_pane_heights")]
    pub pane_heights: [f64; 3],
    #[serde(default)]
    pub filter: FilterPrefs,
    /// Command run when the sync prompt is accepted.
    #[serde(default)]
    pub sync_command: Option<String>,
}

fn default_pane_heights() -> [f64; 3] {
    DEFAULT_PANE_RATIOS
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            pane_heights: DEFAULT_PANE_RATIOS,
            filter: FilterPrefs::default(),
            sync_command: None,
        }
    }
}

/// Reset invalid ratios to the default split and scale the rest to sum to 1.
pub fn normalize_ratios(ratios: [f64; 3]) -> [f64; 3] {
    if ratios.iter().any(|r| !r.is_finite() || *r < MIN_PANE_RATIO) {
        return DEFAULT_PANE_RATIOS;
    }
    let sum: f64 = ratios.iter().sum();
    let scaled = [ratios[0] / sum, ratios[1] / sum, ratios[2] / sum];
    if scaled.iter().any(|r| *r < MIN_PANE_RATIO - 1e-9) {
        return DEFAULT_PANE_RATIOS;
    }
    scaled
}

/// Read `<base_dir>/config.toml`, returning defaults if missing or unparseable.
pub fn load_config_file(base_dir: &Path) -> ConfigFile {
    let path = base_dir.join("config.toml");
    match std::fs::read_to_string(&path) {
        Ok(contents) => match toml::from_str::<ConfigFile>(&contents) {
            Ok(mut cf) => {
                cf.pane_heights = normalize_ratios(cf.pane_heights);
                cf
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "failed to parse config.toml, using defaults");
                ConfigFile::default()
            }
        },
        Err(_) => ConfigFile::default(),
    }
}

/// Write a `ConfigFile` to `<base_dir>/config.toml`.
pub fn save_config_file(base_dir: &Path, config_file: &ConfigFile) -> Result<()> {
    std::fs::create_dir_all(base_dir)
        .with_context(|| format!("failed to create {}", base_dir.display()))?;
    let path = base_dir.join("config.toml");
    let contents = toml::to_string_pretty(config_file).context("failed to serialize config.toml")?;
    std::fs::write(&path, contents).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

impl Config {
    pub fn new(base_dir: PathBuf, data_dir: PathBuf) -> Self {
        Self { base_dir, data_dir }
    }

    /// Base dir is `~/.tdmon`; the database defaults to `./.todos`.
    pub fn load(data_dir: Option<PathBuf>) -> Result<Self> {
        let home_dir = dirs::home_dir().context("Could not find home directory")?;
        let base_dir = home_dir.join(".tdmon");
        let data_dir = match data_dir {
            Some(dir) => dir,
            None => std::env::current_dir()
                .context("Could not determine current directory")?
                .join(".todos"),
        };

        let config = Self::new(base_dir, data_dir);
        tracing::debug!(base_dir = %config.base_dir.display(), data_dir = %config.data_dir.display(), "config loaded");
        Ok(config)
    }

    pub fn ensure_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(&self.base_dir).context("Failed to create tdmon base directory")?;
        Ok(())
    }

    pub fn log_path(&self) -> PathBuf {
        self.base_dir.join("tdmon.log")
    }

    pub fn config_path(&self) -> PathBuf {
        self.base_dir.join("config.toml")
    }

    pub fn load_file(&self) -> ConfigFile {
        load_config_file(&self.base_dir)
    }

    pub fn save_file(&self, config_file: &ConfigFile) -> Result<()> {
        save_config_file(&self.base_dir, config_file)
    }
}
