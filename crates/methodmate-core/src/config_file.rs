use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::Config;

/// On-disk TOML configuration structure.
/// All fields are optional so partial configs work (merge with defaults).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigFile {
    pub oracle: Option<OracleSection>,
    pub extraction: Option<ExtractionSection>,
    pub concurrency: Option<ConcurrencySection>,
    pub venues: Option<VenuesSection>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OracleSection {
    pub api_url: Option<String>,
    pub api_key: Option<String>,
    pub bot_id: Option<String>,
    pub user_id: Option<String>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractionSection {
    pub max_chunk_length: Option<usize>,
    pub chunk_pacing_ms: Option<u64>,
    pub retry_count: Option<u32>,
    pub retry_delay_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConcurrencySection {
    pub num_workers: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VenuesSection {
    /// Replaces the built-in top-venue list when set.
    pub list: Option<Vec<String>>,
}

/// Name of the per-directory override file.
pub const LOCAL_CONFIG_FILE: &str = ".methodmate.toml";

/// Platform config directory path: `<config_dir>/methodmate/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("methodmate").join("config.toml"))
}

/// Load config by cascading CWD `.methodmate.toml` over platform config.
/// CWD values override platform values.
pub fn load_config() -> ConfigFile {
    let platform = config_path().and_then(|p| load_from_path(&p));
    let cwd = load_from_path(Path::new(LOCAL_CONFIG_FILE));

    match (platform, cwd) {
        (None, None) => ConfigFile::default(),
        (Some(p), None) => p,
        (None, Some(c)) => c,
        (Some(p), Some(c)) => merge(p, c),
    }
}

/// Load a config from a specific path. Returns `None` if the file doesn't
/// exist or can't be parsed.
pub fn load_from_path(path: &Path) -> Option<ConfigFile> {
    let content = std::fs::read_to_string(path).ok()?;
    match toml::from_str(&content) {
        Ok(config) => {
            tracing::debug!(path = %path.display(), "loaded config file");
            Some(config)
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "ignoring unparsable config file");
            None
        }
    }
}

/// Take a field from `overlay` if set there, else from `base`.
fn pick<S, T>(overlay: Option<&S>, base: Option<&S>, field: impl Fn(&S) -> Option<T>) -> Option<T> {
    overlay.and_then(&field).or_else(|| base.and_then(&field))
}

/// Merge two configs: `overlay` values take precedence over `base`.
pub fn merge(base: ConfigFile, overlay: ConfigFile) -> ConfigFile {
    let (bo, oo) = (base.oracle.as_ref(), overlay.oracle.as_ref());
    let (be, oe) = (base.extraction.as_ref(), overlay.extraction.as_ref());
    let (bc, oc) = (base.concurrency.as_ref(), overlay.concurrency.as_ref());
    let (bv, ov) = (base.venues.as_ref(), overlay.venues.as_ref());

    ConfigFile {
        oracle: Some(OracleSection {
            api_url: pick(oo, bo, |s| s.api_url.clone()),
            api_key: pick(oo, bo, |s| s.api_key.clone()),
            bot_id: pick(oo, bo, |s| s.bot_id.clone()),
            user_id: pick(oo, bo, |s| s.user_id.clone()),
            timeout_secs: pick(oo, bo, |s| s.timeout_secs),
        }),
        extraction: Some(ExtractionSection {
            max_chunk_length: pick(oe, be, |s| s.max_chunk_length),
            chunk_pacing_ms: pick(oe, be, |s| s.chunk_pacing_ms),
            retry_count: pick(oe, be, |s| s.retry_count),
            retry_delay_ms: pick(oe, be, |s| s.retry_delay_ms),
        }),
        concurrency: Some(ConcurrencySection {
            num_workers: pick(oc, bc, |s| s.num_workers),
        }),
        venues: Some(VenuesSection {
            list: pick(ov, bv, |s| s.list.clone()),
        }),
    }
}

impl ConfigFile {
    /// Overwrite every field of `config` that this file sets.
    pub fn apply_to(&self, config: &mut Config) {
        if let Some(oracle) = &self.oracle {
            if let Some(url) = &oracle.api_url {
                config.oracle.api_url = url.clone();
            }
            if let Some(key) = &oracle.api_key {
                config.oracle.api_key = Some(key.clone());
            }
            if let Some(bot) = &oracle.bot_id {
                config.oracle.bot_id = bot.clone();
            }
            if let Some(user) = &oracle.user_id {
                config.oracle.user_id = user.clone();
            }
            if let Some(secs) = oracle.timeout_secs {
                config.oracle.timeout = Duration::from_secs(secs);
            }
        }
        if let Some(extraction) = &self.extraction {
            if let Some(max) = extraction.max_chunk_length {
                config.extraction.max_chunk_length = max;
            }
            if let Some(ms) = extraction.chunk_pacing_ms {
                config.extraction.chunk_pacing = Duration::from_millis(ms);
            }
            if let Some(count) = extraction.retry_count {
                config.extraction.retry_count = count;
            }
            if let Some(ms) = extraction.retry_delay_ms {
                config.extraction.retry_delay = Duration::from_millis(ms);
            }
        }
        if let Some(workers) = self.concurrency.as_ref().and_then(|c| c.num_workers) {
            config.num_workers = workers;
        }
        if let Some(list) = self.venues.as_ref().and_then(|v| v.list.as_ref()) {
            config.venues = list.clone();
        }
    }
}
