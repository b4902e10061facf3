use std::ffi::OsString;
use std::path::Path;

use nova_config::{
    discover_config_path, load_for_root, load_for_root_with_diagnostics, with_config_env_lock,
    ConfigError, ConfigWarning, NovaConfig, NOVA_CONFIG_ENV_VAR,
};
use pretty_assertions::assert_eq;
use tempfile::tempdir;

struct EnvVarGuard {
    key: &'static str,
    prev: Option<OsString>,
}

impl EnvVarGuard {
    fn set(key: &'static str, value: &Path) -> Self {
        let prev = std::env::var_os(key);
        std::env::set_var(key, value);
        Self { key, prev }
    }

    fn unset(key: &'static str) -> Self {
        let prev = std::env::var_os(key);
        std::env::remove_var(key);
        Self { key, prev }
    }
}

impl Drop for EnvVarGuard {
    fn drop(&mut self) {
        match &self.prev {
            Some(v) => std::env::set_var(self.key, v),
            None => std::env::remove_var(self.key),
        }
    }
}

#[test]
fn discovers_nova_toml_in_root() {
    with_config_env_lock(|| {
        let _env = EnvVarGuard::unset(NOVA_CONFIG_ENV_VAR);

        let dir = tempdir().unwrap();
        let config_path = dir.path().join("nova.toml");
        std::fs::write(&config_path, "[logging]\nlevel = \"debug\"\n").unwrap();
        std::fs::write(dir.path().join(".nova.toml"), "").unwrap();

        assert_eq!(
            discover_config_path(dir.path()),
            Some(config_path.canonicalize().unwrap_or(config_path))
        );
    });
}

#[test]
fn falls_back_to_hidden_config() {
    with_config_env_lock(|| {
        let _env = EnvVarGuard::unset(NOVA_CONFIG_ENV_VAR);

        let dir = tempdir().unwrap();
        let hidden = dir.path().join(".nova.toml");
        std::fs::write(&hidden, "classpath = [\"classes\"]\n").unwrap();

        let (config, path) = load_for_root(dir.path()).unwrap();
        assert_eq!(path, Some(hidden.canonicalize().unwrap_or(hidden)));
        assert_eq!(config.classpath, vec![std::path::PathBuf::from("classes")]);
    });
}

#[test]
fn env_override_wins_over_root_file() {
    with_config_env_lock(|| {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("nova.toml"), "[logging]\nlevel = \"info\"\n").unwrap();
        std::fs::write(
            dir.path().join("override.toml"),
            "[logging]\nlevel = \"trace\"\n",
        )
        .unwrap();

        // Relative overrides resolve against the root.
        let _env = EnvVarGuard::set(NOVA_CONFIG_ENV_VAR, Path::new("override.toml"));
        let (config, path) = load_for_root(dir.path()).unwrap();
        assert_eq!(config.logging.level, "trace");
        assert!(path.unwrap().ends_with("override.toml"));
    });
}

#[test]
fn missing_config_is_default() {
    with_config_env_lock(|| {
        let _env = EnvVarGuard::unset(NOVA_CONFIG_ENV_VAR);

        let dir = tempdir().unwrap();
        let (config, path, diagnostics) = load_for_root_with_diagnostics(dir.path()).unwrap();
        assert_eq!(config, NovaConfig::default());
        assert_eq!(path, None);
        assert!(diagnostics.is_empty());
    });
}

#[test]
fn env_override_to_a_missing_file_is_an_io_error() {
    with_config_env_lock(|| {
        let dir = tempdir().unwrap();
        let _env = EnvVarGuard::set(NOVA_CONFIG_ENV_VAR, &dir.path().join("absent.toml"));
        assert!(matches!(
            load_for_root(dir.path()),
            Err(ConfigError::Io { .. })
        ));
    });
}

#[test]
fn diagnostics_resolve_classpath_against_the_config_dir() {
    with_config_env_lock(|| {
        let _env = EnvVarGuard::unset(NOVA_CONFIG_ENV_VAR);

        let dir = tempdir().unwrap();
        std::fs::create_dir(dir.path().join("classes")).unwrap();
        std::fs::write(
            dir.path().join("nova.toml"),
            r#"
classpath = ["classes", "libs/app.jar"]
verbose = true

[[inference.bridge_calls]]
owner = ""
name = "check"
"#,
        )
        .unwrap();

        let (config, path, diagnostics) = load_for_root_with_diagnostics(dir.path()).unwrap();
        let config_dir = path.as_deref().and_then(Path::parent).unwrap();
        assert_eq!(config.classpath_entries(config_dir)[0], config_dir.join("classes"));

        assert_eq!(diagnostics.unknown_keys, vec!["verbose".to_string()]);
        assert_eq!(
            diagnostics.warnings,
            vec![ConfigWarning::ClasspathEntryMissing {
                toml_path: "classpath[1]".to_string(),
                resolved: config_dir.join("libs/app.jar"),
            }]
        );
        assert_eq!(diagnostics.errors.len(), 1);
        assert!(!diagnostics.is_ok());
    });
}
