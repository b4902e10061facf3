use serde::de::DeserializeOwned;
use std::fmt;
use std::path::PathBuf;

/// Everything noticed while loading a `nova.toml` that did not stop it from loading.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigDiagnostics {
    /// Keys the schema does not know, as full paths (`inference.bridge_calls[0].ownr`).
    pub unknown_keys: Vec<String>,
    pub warnings: Vec<ConfigWarning>,
    /// Values that would make inference misbehave (an unusable bridge call, for instance).
    pub errors: Vec<ConfigValidationError>,
}

impl ConfigDiagnostics {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.unknown_keys.is_empty() && self.warnings.is_empty() && self.errors.is_empty()
    }

    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    pub(crate) fn extend_validation(&mut self, validation: ValidationDiagnostics) {
        self.warnings.extend(validation.warnings);
        self.errors.extend(validation.errors);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationDiagnostics {
    pub warnings: Vec<ConfigWarning>,
    pub errors: Vec<ConfigValidationError>,
}

#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigWarning {
    ClasspathEntryMissing { toml_path: String, resolved: PathBuf },
    DuplicateBridgeCall { toml_path: String },
    LoggingLevelInvalid { value: String, normalized: String },
}

#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigValidationError {
    InvalidValue { toml_path: String, message: String },
}

impl fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigWarning::ClasspathEntryMissing {
                toml_path,
                resolved,
            } => write!(f, "{toml_path}: {} does not exist", resolved.display()),
            ConfigWarning::DuplicateBridgeCall { toml_path } => {
                write!(f, "{toml_path}: duplicate bridge call")
            }
            ConfigWarning::LoggingLevelInvalid { value, .. } => {
                write!(f, "logging.level: invalid filter `{value}`, using `info`")
            }
        }
    }
}

impl fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigValidationError::InvalidValue { toml_path, message } => {
                write!(f, "{toml_path}: {message}")
            }
        }
    }
}

pub(crate) fn deserialize_toml_with_unknown_keys<T: DeserializeOwned>(
    text: &str,
) -> Result<(T, Vec<String>), toml::de::Error> {
    let mut unknown = Vec::<String>::new();
    let deserializer = toml::de::Deserializer::new(text);
    let value = serde_ignored::deserialize(deserializer, |path| {
        unknown.push(normalize_ignored_path(path));
    })?;
    unknown.sort();
    unknown.dedup();
    Ok((value, unknown))
}

/// Renders `serde_ignored`'s `.a.0.b` as `a[0].b`.
fn normalize_ignored_path(path: serde_ignored::Path) -> String {
    let raw = path.to_string();
    let raw = raw.trim_start_matches('.');
    let mut out = String::with_capacity(raw.len());
    for (idx, segment) in raw.split('.').enumerate() {
        if idx > 0 && !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit()) {
            out.push('[');
            out.push_str(segment);
            out.push(']');
            continue;
        }
        if !out.is_empty() {
            out.push('.');
        }
        out.push_str(segment);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NovaConfig;

    #[test]
    fn unknown_key_paths_include_array_indexes() {
        let text = r#"
classpath = ["build/classes"]
clas_path = ["typo"]

[[inference.bridge_calls]]
owner = "com/example/Checks"
name = "requireNonNull"
descripter = "(Ljava/lang/Object;)V"
"#;

        let (config, unknown) =
            deserialize_toml_with_unknown_keys::<NovaConfig>(text).expect("parse");
        assert_eq!(config.inference.bridge_calls.len(), 1);
        assert_eq!(
            unknown,
            vec!["clas_path", "inference.bridge_calls[0].descripter"]
        );
    }
}
