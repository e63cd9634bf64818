//! Pipeline configuration: the YAML document that selects loaders, processors
//! and the renderer.
//!
//! A document is a mapping with the optional keys `loaders`, `processors` and
//! `renderer`. Each plugin entry is a mapping whose reserved `type` key names a
//! registered plugin; every other key is handed to that plugin's constructor.
//!
//! ```yaml
//! loaders:
//!   - type: python
//!     search_path: [src]
//!     packages: [mypkg]
//! processors:
//!   - type: smart
//!   - type: filter
//!     documented_only: false
//! renderer:
//!   type: markdown
//!   filename: docs/api.md
//! ```
//!
//! This module only checks the *shape* of the document. Resolving type tags
//! to plugin instances happens in [`crate::pipeline::Pipeline::configure`].

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_yaml::{Mapping, Value};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, error, info};

use crate::registry::BuildError;

/// Reserved discriminator key inside a plugin entry.
pub const TYPE_KEY: &str = "type";

/// Where a configuration comes from: a YAML file on disk, or an
/// already-parsed document.
#[derive(Debug, Clone)]
pub enum ConfigSource {
    Path(PathBuf),
    Value(Value),
}

impl From<&str> for ConfigSource {
    fn from(path: &str) -> Self {
        ConfigSource::Path(PathBuf::from(path))
    }
}

impl From<String> for ConfigSource {
    fn from(path: String) -> Self {
        ConfigSource::Path(PathBuf::from(path))
    }
}

impl From<&Path> for ConfigSource {
    fn from(path: &Path) -> Self {
        ConfigSource::Path(path.to_path_buf())
    }
}

impl From<PathBuf> for ConfigSource {
    fn from(path: PathBuf) -> Self {
        ConfigSource::Path(path)
    }
}

impl From<Value> for ConfigSource {
    fn from(value: Value) -> Self {
        ConfigSource::Value(value)
    }
}

impl From<Mapping> for ConfigSource {
    fn from(mapping: Mapping) -> Self {
        ConfigSource::Value(Value::Mapping(mapping))
    }
}

/// The three plugin roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PluginKind {
    Loader,
    Processor,
    Renderer,
}

impl fmt::Display for PluginKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PluginKind::Loader => "loader",
            PluginKind::Processor => "processor",
            PluginKind::Renderer => "renderer",
        };
        f.write_str(name)
    }
}

/// One plugin entry: the type tag plus its construction parameters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PluginSpec {
    #[serde(rename = "type")]
    pub plugin_type: String,
    #[serde(flatten)]
    pub params: Mapping,
}

impl PluginSpec {
    pub fn new(plugin_type: impl Into<String>) -> Self {
        Self {
            plugin_type: plugin_type.into(),
            params: Mapping::new(),
        }
    }

    pub fn with_param(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.set_param(key, value);
        self
    }

    pub fn set_param(&mut self, key: &str, value: impl Into<Value>) {
        self.params.insert(Value::String(key.to_string()), value.into());
    }

    /// Deserializes the parameters into a plugin's typed options.
    pub fn params<T: DeserializeOwned>(&self) -> Result<T, serde_yaml::Error> {
        serde_yaml::from_value(Value::Mapping(self.params.clone()))
    }
}

/// Typed view of a configuration document, with defaults filled in.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub loaders: Vec<PluginSpec>,
    pub processors: Vec<PluginSpec>,
    pub renderer: PluginSpec,
    /// File the document was read from, kept for error context.
    pub path: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            loaders: default_loaders(),
            processors: default_processors(),
            renderer: default_renderer(),
            path: None,
        }
    }
}

pub fn default_loaders() -> Vec<PluginSpec> {
    vec![PluginSpec::new("python")]
}

pub fn default_processors() -> Vec<PluginSpec> {
    vec![PluginSpec::new("smart"), PluginSpec::new("filter")]
}

pub fn default_renderer() -> PluginSpec {
    PluginSpec::new("markdown")
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration file {path} could not be read: {source}")]
    NotFound {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse configuration YAML{}: {message}", location(.path, .line, .column))]
    Parse {
        path: Option<PathBuf>,
        line: Option<usize>,
        column: Option<usize>,
        message: String,
    },

    #[error("invalid configuration{}: `{field}`: {message}", location(.path, &None, &None))]
    Schema {
        path: Option<PathBuf>,
        field: String,
        message: String,
    },

    #[error("unknown {kind} type {type_name:?} at `{field}`{}", location(.path, &None, &None))]
    UnknownPluginType {
        path: Option<PathBuf>,
        kind: PluginKind,
        type_name: String,
        field: String,
    },
}

fn location(path: &Option<PathBuf>, line: &Option<usize>, column: &Option<usize>) -> String {
    let mut out = String::new();
    if let Some(path) = path {
        out.push_str(&format!(" in {}", path.display()));
    }
    match (line, column) {
        (Some(line), Some(column)) => out.push_str(&format!(" at line {line}, column {column}")),
        (Some(line), None) => out.push_str(&format!(" at line {line}")),
        _ => {}
    }
    out
}

impl ConfigError {
    fn schema(path: Option<&Path>, field: impl Into<String>, message: impl Into<String>) -> Self {
        ConfigError::Schema {
            path: path.map(Path::to_path_buf),
            field: field.into(),
            message: message.into(),
        }
    }

    /// Attaches file and field context to a plugin construction failure.
    pub(crate) fn from_build(err: BuildError, field: String, path: Option<&Path>) -> Self {
        match err {
            BuildError::Unknown { kind, type_name } => ConfigError::UnknownPluginType {
                path: path.map(Path::to_path_buf),
                kind,
                type_name,
                field,
            },
            BuildError::Invalid { source, .. } => {
                ConfigError::schema(path, field, source.to_string())
            }
        }
    }
}

impl PipelineConfig {
    /// Reads and validates a YAML configuration file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();
        info!(config_path = ?path_ref, "Loading configuration file");

        let content = match fs::read_to_string(path_ref) {
            Ok(content) => {
                debug!(config_path = ?path_ref, bytes = content.len(), "Config file read successfully");
                content
            }
            Err(e) => {
                error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
                return Err(ConfigError::NotFound {
                    path: path_ref.to_path_buf(),
                    source: e,
                });
            }
        };

        let value: Value = match serde_yaml::from_str(&content) {
            Ok(value) => value,
            Err(e) => {
                error!(error = %e, config_path = ?path_ref, "Failed to parse config YAML");
                let loc = e.location();
                return Err(ConfigError::Parse {
                    path: Some(path_ref.to_path_buf()),
                    line: loc.as_ref().map(|l| l.line()),
                    column: loc.as_ref().map(|l| l.column()),
                    message: e.to_string(),
                });
            }
        };

        Self::from_document(value, Some(path_ref))
    }

    /// Validates an in-memory configuration document.
    pub fn from_value(value: Value) -> Result<Self, ConfigError> {
        Self::from_document(value, None)
    }

    pub fn from_source(source: ConfigSource) -> Result<Self, ConfigError> {
        match source {
            ConfigSource::Path(path) => Self::from_path(path),
            ConfigSource::Value(value) => Self::from_value(value),
        }
    }

    fn from_document(value: Value, path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = PipelineConfig {
            path: path.map(Path::to_path_buf),
            ..PipelineConfig::default()
        };

        let mapping = match value {
            Value::Null => return Ok(config),
            Value::Mapping(mapping) => mapping,
            other => {
                return Err(ConfigError::schema(
                    path,
                    "<root>",
                    format!("expected a mapping, found {}", value_kind(&other)),
                ))
            }
        };

        for (key, value) in mapping {
            let key = match key {
                Value::String(key) => key,
                other => {
                    return Err(ConfigError::schema(
                        path,
                        "<root>",
                        format!("keys must be strings, found {}", value_kind(&other)),
                    ))
                }
            };
            match key.as_str() {
                "loaders" => config.loaders = parse_spec_list(value, "loaders", path)?,
                "processors" => config.processors = parse_spec_list(value, "processors", path)?,
                "renderer" => config.renderer = parse_spec(value, "renderer".to_string(), path)?,
                other => {
                    return Err(ConfigError::schema(
                        path,
                        other,
                        "unknown key, expected one of `loaders`, `processors`, `renderer`",
                    ))
                }
            }
        }

        debug!(
            loaders = config.loaders.len(),
            processors = config.processors.len(),
            renderer = %config.renderer.plugin_type,
            "Parsed pipeline configuration"
        );
        Ok(config)
    }

    /// Renders the configuration back into a YAML document.
    pub fn to_value(&self) -> Value {
        let mut mapping = Mapping::new();
        let specs = |specs: &[PluginSpec]| {
            Value::Sequence(specs.iter().map(PluginSpec::to_value).collect())
        };
        mapping.insert("loaders".into(), specs(&self.loaders));
        mapping.insert("processors".into(), specs(&self.processors));
        mapping.insert("renderer".into(), self.renderer.to_value());
        Value::Mapping(mapping)
    }
}

impl PluginSpec {
    pub fn to_value(&self) -> Value {
        let mut mapping = Mapping::new();
        mapping.insert(TYPE_KEY.into(), Value::String(self.plugin_type.clone()));
        for (k, v) in &self.params {
            mapping.insert(k.clone(), v.clone());
        }
        Value::Mapping(mapping)
    }
}

fn parse_spec_list(value: Value, field: &str, path: Option<&Path>) -> Result<Vec<PluginSpec>, ConfigError> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::Sequence(items) => items
            .into_iter()
            .enumerate()
            .map(|(i, item)| parse_spec(item, format!("{field}[{i}]"), path))
            .collect(),
        single @ Value::Mapping(_) => Ok(vec![parse_spec(single, field.to_string(), path)?]),
        other => Err(ConfigError::schema(
            path,
            field,
            format!("expected a list of plugins or a single plugin, found {}", value_kind(&other)),
        )),
    }
}

fn parse_spec(value: Value, field: String, path: Option<&Path>) -> Result<PluginSpec, ConfigError> {
    let mut mapping = match value {
        Value::Mapping(mapping) => mapping,
        other => {
            return Err(ConfigError::schema(
                path,
                field,
                format!("expected a plugin mapping, found {}", value_kind(&other)),
            ))
        }
    };

    let plugin_type = match mapping.remove(TYPE_KEY) {
        Some(Value::String(tag)) => tag,
        Some(other) => {
            return Err(ConfigError::schema(
                path,
                format!("{field}.{TYPE_KEY}"),
                format!("expected a string, found {}", value_kind(&other)),
            ))
        }
        None => {
            return Err(ConfigError::schema(
                path,
                field,
                format!("missing required key `{TYPE_KEY}`"),
            ))
        }
    };

    if let Some(bad) = mapping.keys().find(|k| !k.is_string()) {
        return Err(ConfigError::schema(
            path,
            field,
            format!("parameter names must be strings, found {}", value_kind(bad)),
        ));
    }

    Ok(PluginSpec {
        plugin_type,
        params: mapping,
    })
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a list",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}
