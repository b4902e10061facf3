use std::collections::HashSet;
use std::path::Path;

use crate::diagnostics::{ConfigValidationError, ConfigWarning, ValidationDiagnostics};
use crate::{LoggingConfig, NovaConfig};

/// Context for semantic config validation.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfigValidationContext<'a> {
    /// Directory containing the loaded config file; relative classpath entries resolve against
    /// it. Without it, classpath entries are not checked.
    pub config_dir: Option<&'a Path>,
}

impl NovaConfig {
    /// Validate semantic invariants, reporting as many problems as possible in one pass.
    #[must_use]
    pub fn validate(&self) -> ValidationDiagnostics {
        self.validate_with_context(ConfigValidationContext::default())
    }

    #[must_use]
    pub fn validate_with_context(&self, ctx: ConfigValidationContext<'_>) -> ValidationDiagnostics {
        let mut out = ValidationDiagnostics::default();

        validate_classpath(self, ctx, &mut out);
        validate_bridge_calls(self, &mut out);
        validate_logging(self, &mut out);

        out
    }
}

fn validate_classpath(
    config: &NovaConfig,
    ctx: ConfigValidationContext<'_>,
    out: &mut ValidationDiagnostics,
) {
    let Some(base) = ctx.config_dir else {
        return;
    };
    for (idx, resolved) in config.classpath_entries(base).into_iter().enumerate() {
        if !resolved.exists() {
            out.warnings.push(ConfigWarning::ClasspathEntryMissing {
                toml_path: format!("classpath[{idx}]"),
                resolved,
            });
        }
    }
}

fn validate_bridge_calls(config: &NovaConfig, out: &mut ValidationDiagnostics) {
    let mut seen = HashSet::new();
    for (idx, call) in config.inference.bridge_calls.iter().enumerate() {
        let path = format!("inference.bridge_calls[{idx}]");

        if call.owner.trim().is_empty() {
            out.errors.push(invalid(&path, "owner", "must not be empty"));
        } else if call.owner.contains([';', '[']) {
            out.errors.push(invalid(
                &path,
                "owner",
                "must be a class name, not a descriptor",
            ));
        }

        if call.name.trim().is_empty() {
            out.errors.push(invalid(&path, "name", "must not be empty"));
        }

        if let Some(descriptor) = &call.descriptor {
            if !descriptor.starts_with('(') || !descriptor.contains(')') {
                out.errors.push(invalid(
                    &path,
                    "descriptor",
                    "must be a method descriptor such as `(Ljava/lang/Object;)V`",
                ));
            }
        }

        if !seen.insert(call.to_bridge_call()) {
            out.warnings
                .push(ConfigWarning::DuplicateBridgeCall { toml_path: path });
        }
    }
}

fn invalid(path: &str, key: &str, message: &str) -> ConfigValidationError {
    ConfigValidationError::InvalidValue {
        toml_path: format!("{path}.{key}"),
        message: message.to_string(),
    }
}

fn validate_logging(config: &NovaConfig, out: &mut ValidationDiagnostics) {
    let normalized = LoggingConfig::normalize_level_directives(&config.logging.level);
    if !config.logging.level.trim().is_empty()
        && tracing_subscriber::EnvFilter::try_new(normalized.clone()).is_err()
    {
        out.warnings.push(ConfigWarning::LoggingLevelInvalid {
            value: config.logging.level.clone(),
            normalized,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BridgeCallConfig;
    use pretty_assertions::assert_eq;

    fn bridge(owner: &str, name: &str, descriptor: Option<&str>) -> BridgeCallConfig {
        BridgeCallConfig {
            owner: owner.to_string(),
            name: name.to_string(),
            descriptor: descriptor.map(str::to_string),
        }
    }

    #[test]
    fn default_config_is_valid() {
        assert_eq!(NovaConfig::default().validate(), ValidationDiagnostics::default());
    }

    #[test]
    fn bridge_calls_are_checked() {
        let mut config = NovaConfig::default();
        config.inference.bridge_calls = vec![
            bridge("", "check", None),
            bridge("Lcom/example/Checks;", "check", Some("V")),
            bridge("com/example/Checks", "requireNonNull", None),
            bridge("com.example.Checks", "requireNonNull", None),
        ];

        let diagnostics = config.validate();
        assert_eq!(
            diagnostics.errors,
            vec![
                invalid("inference.bridge_calls[0]", "owner", "must not be empty"),
                invalid(
                    "inference.bridge_calls[1]",
                    "owner",
                    "must be a class name, not a descriptor"
                ),
                invalid(
                    "inference.bridge_calls[1]",
                    "descriptor",
                    "must be a method descriptor such as `(Ljava/lang/Object;)V`"
                ),
            ]
        );
        assert_eq!(
            diagnostics.warnings,
            vec![ConfigWarning::DuplicateBridgeCall {
                toml_path: "inference.bridge_calls[3]".to_string()
            }]
        );
    }

    #[test]
    fn missing_classpath_entries_warn_relative_to_the_config_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("classes")).unwrap();

        let mut config = NovaConfig::default();
        config.classpath = vec!["classes".into(), "lib/missing.jar".into()];

        assert!(config.validate().warnings.is_empty());

        let diagnostics = config.validate_with_context(ConfigValidationContext {
            config_dir: Some(dir.path()),
        });
        assert_eq!(
            diagnostics.warnings,
            vec![ConfigWarning::ClasspathEntryMissing {
                toml_path: "classpath[1]".to_string(),
                resolved: dir.path().join("lib/missing.jar"),
            }]
        );
    }

    #[test]
    fn invalid_logging_level_warns() {
        let mut config = NovaConfig::default();
        config.logging.level = "nova.infer=loud".to_string();
        assert_eq!(
            config.validate().warnings,
            vec![ConfigWarning::LoggingLevelInvalid {
                value: "nova.infer=loud".to_string(),
                normalized: "nova.infer=loud".to_string(),
            }]
        );
    }
}
