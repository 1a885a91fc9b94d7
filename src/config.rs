//! Persisted settings and the directory layout derived from them.

use anyhow::{Context, Result, bail};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::archive::SafetyLimits;
use crate::package::DEFAULT_METADATA_FILE;
use crate::packaging::{
    DEFAULT_OUTPUT_NAME, DEFAULT_POLL_TIMEOUT, DEFAULT_TOOL_ID, HandoffOptions, OriginalFiles,
    POLL_INTERVAL, PROTECTED_FILES,
};
use crate::runtime::{Runtime, normalize_path, write_atomic};
use crate::staging::{
    CollisionPolicy, DEFAULT_IGNORE_EXTENSIONS, DEFAULT_OVERRIDE_ARTIFACT,
    DEFAULT_PAYLOAD_EXTENSIONS, IgnoreList, PayloadRules, StagingOptions,
};

pub const APP_DIR: &str = "hfwmm";
pub const SETTINGS_FILE: &str = "settings.json";
pub const TOOL_FILE: &str = "Decima_pack.exe";

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub game_dir: Option<PathBuf>,
    pub work_dir: Option<PathBuf>,
    pub tool_path: Option<PathBuf>,
    pub output_name: String,
    pub tool_id: String,
    pub max_file_size: u64,
    pub max_total_uncompressed_size: u64,
    pub poll_timeout_ms: u64,
    pub payload_extensions: Vec<String>,
    pub strict_payload_names: bool,
    pub ignore_extensions: Vec<String>,
    pub metadata_file: String,
    pub override_artifact: String,
    pub protected_files: Vec<String>,
    pub collision_policy: CollisionPolicy,
}

impl Default for Settings {
    fn default() -> Self {
        let limits = SafetyLimits::default();
        Self {
            game_dir: None,
            work_dir: None,
            tool_path: None,
            output_name: DEFAULT_OUTPUT_NAME.to_string(),
            tool_id: DEFAULT_TOOL_ID.to_string(),
            max_file_size: limits.max_file_size,
            max_total_uncompressed_size: limits.max_total_uncompressed_size,
            poll_timeout_ms: DEFAULT_POLL_TIMEOUT.as_millis() as u64,
            payload_extensions: strings(&DEFAULT_PAYLOAD_EXTENSIONS),
            strict_payload_names: true,
            ignore_extensions: strings(&DEFAULT_IGNORE_EXTENSIONS),
            metadata_file: DEFAULT_METADATA_FILE.to_string(),
            override_artifact: DEFAULT_OVERRIDE_ARTIFACT.to_string(),
            protected_files: strings(&PROTECTED_FILES),
            collision_policy: CollisionPolicy::default(),
        }
    }
}

impl Settings {
    /// `<config_dir>/hfwmm/settings.json`
    pub fn default_path<R: Runtime>(runtime: &R) -> Result<PathBuf> {
        let config_dir = runtime
            .config_dir()
            .or_else(|| runtime.home_dir().map(|h| h.join(".config")))
            .context("Could not find a configuration directory")?;
        Ok(config_dir.join(APP_DIR).join(SETTINGS_FILE))
    }

    /// Load settings. A missing file gives the defaults; an unreadable or
    /// malformed one is an error.
    #[tracing::instrument(skip(runtime))]
    pub fn load<R: Runtime>(runtime: &R, path: &Path) -> Result<Self> {
        if !runtime.exists(path) {
            debug!("No settings at {:?}, using defaults", path);
            return Ok(Self::default());
        }
        let content = runtime
            .read_to_string(path)
            .with_context(|| format!("Failed to read settings {:?}", path))?;
        serde_json::from_str(&content).with_context(|| format!("Malformed settings file {:?}", path))
    }

    #[tracing::instrument(skip(self, runtime))]
    pub fn save<R: Runtime>(&self, runtime: &R, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        write_atomic(runtime, path, json.as_bytes())?;
        info!("Saved settings to {:?}", path);
        Ok(())
    }

    pub fn safety_limits(&self) -> SafetyLimits {
        SafetyLimits {
            max_file_size: self.max_file_size,
            max_total_uncompressed_size: self.max_total_uncompressed_size,
        }
    }

    pub fn ignore_list(&self) -> IgnoreList {
        IgnoreList::new(self.ignore_extensions.iter().cloned())
    }

    pub fn staging_options(&self) -> StagingOptions {
        StagingOptions {
            rules: PayloadRules {
                extensions: self.payload_extensions.clone(),
                strict_names: self.strict_payload_names,
            },
            limits: self.safety_limits(),
            policy: self.collision_policy,
            override_artifact: self.override_artifact.clone(),
        }
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }
}

/// Command-line overrides for the persisted directories.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LayoutOverrides {
    pub game_dir: Option<PathBuf>,
    pub work_dir: Option<PathBuf>,
}

/// Every path the engine touches, derived from the game directory and the
/// work root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameLayout {
    pub game_dir: PathBuf,
    /// Packages root: user-dropped folders and archives.
    pub mods_dir: PathBuf,
    pub package_dir: PathBuf,
    pub archive_out: PathBuf,
    pub work_root: PathBuf,
    pub scratch: PathBuf,
    pub backup_dir: PathBuf,
    pub extracted_dir: PathBuf,
    pub registry_path: PathBuf,
    pub tool_path: PathBuf,
}

impl GameLayout {
    pub fn new(game_dir: PathBuf, work_root: PathBuf, tool_path: Option<PathBuf>) -> Self {
        let package_dir = game_dir.join("LocalCacheWinGame").join("package");
        Self {
            mods_dir: game_dir.join("mods"),
            archive_out: package_dir.join("ar"),
            package_dir,
            game_dir,
            scratch: work_root.join("pack"),
            backup_dir: work_root.join("backup"),
            extracted_dir: work_root.join("extracted"),
            registry_path: work_root.join(crate::registry::REGISTRY_FILE),
            tool_path: tool_path.unwrap_or_else(|| work_root.join(TOOL_FILE)),
            work_root,
        }
    }

    /// Overrides win over settings; the work root falls back to `~/.hfwmm`.
    #[tracing::instrument(skip(runtime, settings))]
    pub fn resolve<R: Runtime>(
        runtime: &R,
        settings: &Settings,
        overrides: &LayoutOverrides,
    ) -> Result<Self> {
        let Some(game_dir) = overrides
            .game_dir
            .clone()
            .or_else(|| settings.game_dir.clone())
        else {
            bail!("No game directory configured. Run `hfwmm init <GAME_DIR>` or pass --game.");
        };
        let work_root = match overrides.work_dir.clone().or_else(|| settings.work_dir.clone()) {
            Some(dir) => dir,
            None => default_work_root(runtime)?,
        };
        let game_dir = absolute(runtime, game_dir)?;
        let work_root = absolute(runtime, work_root)?;
        let tool_path = match settings.tool_path.clone() {
            Some(tool) => Some(absolute(runtime, tool)?),
            None => None,
        };
        debug!("Using game dir {:?}, work root {:?}", game_dir, work_root);
        Ok(Self::new(game_dir, work_root, tool_path))
    }

    /// Create the folders the engine writes into.
    pub fn ensure_dirs<R: Runtime>(&self, runtime: &R) -> Result<()> {
        for dir in [&self.mods_dir, &self.work_root, &self.backup_dir] {
            runtime
                .create_dir_all(dir)
                .with_context(|| format!("Failed to create {:?}", dir))?;
        }
        Ok(())
    }

    pub fn original_files(&self, settings: &Settings) -> OriginalFiles {
        OriginalFiles::new(
            self.package_dir.clone(),
            self.backup_dir.clone(),
            self.archive_out.clone(),
        )
        .with_protected(settings.protected_files.clone())
    }

    pub fn handoff_options(&self, settings: &Settings) -> HandoffOptions {
        HandoffOptions {
            tool_path: self.tool_path.clone(),
            work_root: self.work_root.clone(),
            output_name: settings.output_name.clone(),
            tool_id: settings.tool_id.clone(),
            archive_out: self.archive_out.clone(),
            poll_timeout: settings.poll_timeout(),
            poll_interval: POLL_INTERVAL,
        }
    }
}

/// The packaging tool runs with the work root as its working directory, so
/// every layout path is anchored to the current directory up front.
fn absolute<R: Runtime>(runtime: &R, path: PathBuf) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path);
    }
    Ok(normalize_path(&runtime.current_dir()?.join(path)))
}

/// `~/.hfwmm`
#[tracing::instrument(skip(runtime))]
pub fn default_work_root<R: Runtime>(runtime: &R) -> Result<PathBuf> {
    let home_dir = runtime
        .home_dir()
        .context("Could not find home directory")?;
    Ok(home_dir.join(".hfwmm"))
}
