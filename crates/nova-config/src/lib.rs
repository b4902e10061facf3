use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use nova_return_infer::{BridgeCall, SkipList};
use parking_lot::ReentrantMutex;
use thiserror::Error;

mod diagnostics;
mod logging;
mod schema;
mod validation;

pub use diagnostics::{ConfigDiagnostics, ConfigValidationError, ConfigWarning, ValidationDiagnostics};
pub use logging::init_tracing;
pub use schema::json_schema;
pub use validation::ConfigValidationContext;

/// Top-level `nova.toml`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[schemars(deny_unknown_fields)]
pub struct NovaConfig {
    /// Class directories, jars and jmods searched in order (relative to the config file).
    #[serde(default)]
    #[schemars(with = "Vec<String>")]
    pub classpath: Vec<PathBuf>,

    #[serde(default)]
    pub inference: InferenceConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
#[schemars(deny_unknown_fields)]
pub struct InferenceConfig {
    /// Skip the `dup` (+ string literal) feeding a skipped bridging call.
    #[serde(default = "default_true")]
    pub dup_literal_idiom: bool,

    /// Include the Kotlin `Intrinsics` null checks in the skip list.
    #[serde(default = "default_true")]
    pub kotlin_intrinsics: bool,

    /// Additional static calls the producer walk steps over.
    #[serde(default)]
    pub bridge_calls: Vec<BridgeCallConfig>,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            dup_literal_idiom: true,
            kotlin_intrinsics: true,
            bridge_calls: Vec::new(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[schemars(deny_unknown_fields)]
pub struct BridgeCallConfig {
    /// Declaring class, internal (`kotlin/jvm/internal/Intrinsics`) or binary name.
    pub owner: String,
    pub name: String,
    /// Method descriptor; every overload matches when omitted.
    #[serde(default)]
    pub descriptor: Option<String>,
}

fn default_true() -> bool {
    true
}

impl InferenceConfig {
    pub fn skip_list(&self) -> SkipList {
        let mut calls = if self.kotlin_intrinsics {
            SkipList::default().bridge_calls().to_vec()
        } else {
            Vec::new()
        };
        for call in &self.bridge_calls {
            let bridge = call.to_bridge_call();
            if !calls.contains(&bridge) {
                calls.push(bridge);
            }
        }
        SkipList::new(calls, self.dup_literal_idiom)
    }
}

impl BridgeCallConfig {
    pub fn to_bridge_call(&self) -> BridgeCall {
        let bridge = BridgeCall::new(&self.owner, self.name.clone());
        match &self.descriptor {
            Some(descriptor) => bridge.with_descriptor(descriptor.clone()),
            None => bridge,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[schemars(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Level (`info`, `debug`, ...) or a full `EnvFilter` directive string.
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,

    /// Emit logs in JSON format.
    #[serde(default)]
    pub json: bool,

    /// Mirror logs to stderr.
    #[serde(default = "default_true")]
    pub stderr: bool,

    /// Append logs to the given file path.
    ///
    /// If the file cannot be opened, file logging is disabled while stderr stays active.
    #[serde(default)]
    #[schemars(with = "Option<String>")]
    pub file: Option<PathBuf>,
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".to_owned()
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
            json: false,
            stderr: true,
            file: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse toml config: {0}")]
    Toml(String),
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        // `Display` embeds a source snippet; keep only the message.
        ConfigError::Toml(err.message().to_owned())
    }
}

impl NovaConfig {
    /// Load a config file from TOML.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = read_config(path)?;
        Ok(toml::from_str(&text)?)
    }

    /// Load a config file and report unknown keys plus validation results.
    pub fn load_from_path_with_diagnostics(
        path: impl AsRef<Path>,
    ) -> Result<(Self, ConfigDiagnostics), ConfigError> {
        let path = path.as_ref();
        let text = read_config(path)?;
        let ctx = ConfigValidationContext {
            config_dir: path.parent(),
        };
        Self::load_from_str_with_diagnostics_inner(&text, ctx)
    }

    pub fn load_from_str_with_diagnostics(
        text: &str,
    ) -> Result<(Self, ConfigDiagnostics), ConfigError> {
        Self::load_from_str_with_diagnostics_inner(text, ConfigValidationContext::default())
    }

    fn load_from_str_with_diagnostics_inner(
        text: &str,
        ctx: ConfigValidationContext<'_>,
    ) -> Result<(Self, ConfigDiagnostics), ConfigError> {
        let (config, unknown_keys) =
            diagnostics::deserialize_toml_with_unknown_keys::<NovaConfig>(text)?;

        let mut diagnostics = ConfigDiagnostics {
            unknown_keys,
            ..ConfigDiagnostics::default()
        };
        diagnostics.extend_validation(config.validate_with_context(ctx));
        Ok((config, diagnostics))
    }

    /// Classpath entries with relative paths resolved against `base`.
    pub fn classpath_entries(&self, base: &Path) -> Vec<PathBuf> {
        self.classpath
            .iter()
            .map(|entry| {
                if entry.is_absolute() {
                    entry.clone()
                } else {
                    base.join(entry)
                }
            })
            .collect()
    }
}

fn read_config(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })
}

pub const NOVA_CONFIG_ENV_VAR: &str = "NOVA_CONFIG_PATH";

static CONFIG_ENV_LOCK: OnceLock<ReentrantMutex<()>> = OnceLock::new();

fn config_env_lock() -> &'static ReentrantMutex<()> {
    CONFIG_ENV_LOCK.get_or_init(|| ReentrantMutex::new(()))
}

/// Run `f` while holding the config environment lock.
///
/// Tests that set [`NOVA_CONFIG_ENV_VAR`] must do so inside this helper so concurrent discovery
/// in other threads never observes the temporary value.
pub fn with_config_env_lock<R>(f: impl FnOnce() -> R) -> R {
    let _guard = config_env_lock().lock();
    f()
}

/// Discover the configuration file for a working directory.
///
/// Search order:
/// 1) `NOVA_CONFIG_PATH` (absolute or relative to `root`)
/// 2) `nova.toml` in `root`
/// 3) `.nova.toml` in `root`
pub fn discover_config_path(root: &Path) -> Option<PathBuf> {
    let _guard = config_env_lock().lock();
    if let Some(value) = std::env::var_os(NOVA_CONFIG_ENV_VAR) {
        let candidate = PathBuf::from(value);
        let path = if candidate.is_absolute() {
            candidate
        } else {
            root.join(candidate)
        };
        return Some(path.canonicalize().unwrap_or(path));
    }

    ["nova.toml", ".nova.toml"]
        .into_iter()
        .map(|name| root.join(name))
        .find(|path| path.is_file())
        .map(|path| path.canonicalize().unwrap_or(path))
}

/// Load the configuration for `root`.
///
/// If no config is present, returns [`NovaConfig::default`] and `None`.
pub fn load_for_root(root: &Path) -> Result<(NovaConfig, Option<PathBuf>), ConfigError> {
    let Some(path) = discover_config_path(root) else {
        return Ok((NovaConfig::default(), None));
    };

    let config = NovaConfig::load_from_path(&path)?;
    Ok((config, Some(path)))
}

/// Like [`load_for_root`], also returning diagnostics (empty when no config is present).
pub fn load_for_root_with_diagnostics(
    root: &Path,
) -> Result<(NovaConfig, Option<PathBuf>, ConfigDiagnostics), ConfigError> {
    let Some(path) = discover_config_path(root) else {
        return Ok((NovaConfig::default(), None, ConfigDiagnostics::default()));
    };

    let (config, diagnostics) = NovaConfig::load_from_path_with_diagnostics(&path)?;
    Ok((config, Some(path), diagnostics))
}
