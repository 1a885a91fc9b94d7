use anyhow::Result;
use log::debug;
use std::path::PathBuf;

use crate::cleanup::{self, SharedCleanupContext};
use crate::config::{GameLayout, LayoutOverrides, Settings};
use crate::runtime::Runtime;

/// Everything a command needs: the runtime, the loaded settings and the
/// command-line overrides.
pub struct Config<R: Runtime> {
    pub runtime: R,
    pub settings_path: PathBuf,
    pub settings: Settings,
    pub overrides: LayoutOverrides,
    pub cleanup: SharedCleanupContext,
}

impl<R: Runtime> Config<R> {
    /// Load settings from `settings_path`, or from the default location.
    pub fn load(
        runtime: R,
        settings_path: Option<PathBuf>,
        overrides: LayoutOverrides,
        cleanup: SharedCleanupContext,
    ) -> Result<Self> {
        let settings_path = match settings_path {
            Some(path) => path,
            None => Settings::default_path(&runtime)?,
        };
        debug!("Using settings {:?}", settings_path);
        let settings = Settings::load(&runtime, &settings_path)?;
        Ok(Self {
            runtime,
            settings_path,
            settings,
            overrides,
            cleanup,
        })
    }

    pub fn new(runtime: R, settings_path: PathBuf, settings: Settings) -> Self {
        Self {
            runtime,
            settings_path,
            settings,
            overrides: LayoutOverrides::default(),
            cleanup: cleanup::new_shared(),
        }
    }

    pub fn layout(&self) -> Result<GameLayout> {
        GameLayout::resolve(&self.runtime, &self.settings, &self.overrides)
    }

    pub fn save_settings(&self) -> Result<()> {
        self.settings.save(&self.runtime, &self.settings_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::MockRuntime;
    use mockall::predicate::eq;

    #[test]
    fn test_config_load_uses_default_settings_path() {
        // --- Setup ---
        let mut runtime = MockRuntime::new();
        runtime
            .expect_config_dir()
            .returning(|| Some(PathBuf::from("/home/user/.config")));
        runtime
            .expect_exists()
            .with(eq(PathBuf::from("/home/user/.config/hfwmm/settings.json")))
            .returning(|_| false);

        // --- Execute ---
        let config = Config::load(
            runtime,
            None,
            LayoutOverrides::default(),
            cleanup::new_shared(),
        )
        .unwrap();

        // --- Verify ---
        assert_eq!(
            config.settings_path,
            PathBuf::from("/home/user/.config/hfwmm/settings.json")
        );
        assert_eq!(config.settings, Settings::default());
    }

    #[test]
    fn test_config_layout_applies_overrides() {
        let mut runtime = MockRuntime::new();
        runtime
            .expect_exists()
            .with(eq(PathBuf::from("/cfg/settings.json")))
            .returning(|_| false);

        let overrides = LayoutOverrides {
            game_dir: Some(PathBuf::from("/games/hfw")),
            work_dir: Some(PathBuf::from("/w")),
        };
        let config = Config::load(
            runtime,
            Some(PathBuf::from("/cfg/settings.json")),
            overrides,
            cleanup::new_shared(),
        )
        .unwrap();

        let layout = config.layout().unwrap();
        assert_eq!(layout.mods_dir, PathBuf::from("/games/hfw/mods"));
        assert_eq!(layout.registry_path, PathBuf::from("/w/registry.json"));
    }
}
