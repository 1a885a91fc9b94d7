use anyhow::{Result, bail};
use serde_json::Value;

use super::config::Config;
use crate::package::normalize;
use crate::registry::Registry;
use crate::runtime::Runtime;

/// Set a package's priority in the registry. Only integers from 0 to 5 are
/// accepted; lower numbers take precedence.
#[tracing::instrument(skip(config))]
pub fn priority<R: Runtime>(config: Config<R>, package: &str, value: &str) -> Result<()> {
    let layout = config.layout()?;
    let key = normalize(package);
    let mut registry = Registry::load(&config.runtime, &layout.registry_path);
    if registry.get(&key).is_none() {
        bail!("Package {} is not in the registry. Run `hfwmm scan` first.", key);
    }

    let value = serde_json::from_str::<Value>(value).unwrap_or_else(|_| Value::from(value));
    let priority = registry.set_priority(&key, &value)?;
    registry.persist(&config.runtime)?;

    println!("Priority of {} set to {}.", key, priority);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::runtime::RealRuntime;
    use std::fs;
    use std::path::Path;
    use tempfile::tempdir;

    fn scanned(root: &Path) -> Config<RealRuntime> {
        fs::create_dir_all(root.join("game/mods/Outfit")).unwrap();
        let mut config = Config::new(
            RealRuntime,
            root.join("settings.json"),
            Settings::default(),
        );
        config.overrides.game_dir = Some(root.join("game"));
        config.overrides.work_dir = Some(root.join("work"));
        let layout = config.layout().unwrap();
        crate::application::scan(&RealRuntime, &layout, &config.settings, None).unwrap();
        config
    }

    #[test]
    fn test_priority_set_and_persisted() {
        let dir = tempdir().unwrap();
        priority(scanned(dir.path()), "Outfit", "1").unwrap();

        let registry = Registry::load(&RealRuntime, &dir.path().join("work/registry.json"));
        assert_eq!(registry.get("Outfit").unwrap().priority, 1);
    }

    #[test]
    fn test_priority_rejects_out_of_range_and_words() {
        let dir = tempdir().unwrap();
        assert!(priority(scanned(dir.path()), "Outfit", "7").is_err());
        assert!(priority(scanned(dir.path()), "Outfit", "high").is_err());

        let registry = Registry::load(&RealRuntime, &dir.path().join("work/registry.json"));
        assert_eq!(registry.get("Outfit").unwrap().priority, 5);
    }

    #[test]
    fn test_priority_unknown_package() {
        let dir = tempdir().unwrap();
        let err = priority(scanned(dir.path()), "Ghost", "1").unwrap_err();
        assert!(err.to_string().contains("not in the registry"));
    }
}
