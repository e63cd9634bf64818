/// `load_config` module: turns command line source options into a [`PipelineConfig`].
///
/// A config file, when given, is read through `docpipe-core` so its errors carry
/// file and field context. Modules, packages and search directories given on the
/// command line then replace the configured loaders with a single `python`
/// loader built from them.
///
/// # Errors
/// All errors are returned as `anyhow::Error` with context, and surfaced at the CLI boundary.
use anyhow::{Context, Result};
use docpipe_core::{PipelineConfig, PluginSpec};
use serde_yaml::Value;
use std::path::PathBuf;
use tracing::info;

/// Command line options selecting the configuration and the modules to load.
#[derive(Debug, Clone, Default)]
pub struct SourceOptions {
    pub config: Option<PathBuf>,
    pub modules: Vec<String>,
    pub packages: Vec<String>,
    pub search_path: Vec<PathBuf>,
}

impl SourceOptions {
    fn overrides_loaders(&self) -> bool {
        !self.modules.is_empty() || !self.packages.is_empty() || !self.search_path.is_empty()
    }

    /// The `python` loader spec described by these options.
    pub fn loader_spec(&self) -> PluginSpec {
        let mut spec = PluginSpec::new("python");
        if !self.search_path.is_empty() {
            let dirs: Vec<Value> = self
                .search_path
                .iter()
                .map(|p| Value::String(p.to_string_lossy().into_owned()))
                .collect();
            spec.set_param("search_path", Value::Sequence(dirs));
        }
        if !self.modules.is_empty() {
            spec.set_param("modules", self.modules.clone());
        }
        if !self.packages.is_empty() {
            spec.set_param("packages", self.packages.clone());
        }
        spec
    }
}

/// Loads the config file (if any) and applies command line overrides.
pub fn build_config(options: &SourceOptions) -> Result<PipelineConfig> {
    let mut config = match &options.config {
        Some(path) => PipelineConfig::from_path(path)
            .with_context(|| format!("Failed to load configuration {}", path.display()))?,
        None => {
            info!("No config file given, using the default pipeline");
            PipelineConfig::default()
        }
    };

    if options.overrides_loaders() {
        let spec = options.loader_spec();
        info!(loader = ?spec, "Replacing configured loaders with command line sources");
        config.loaders = vec![spec];
    }

    Ok(config)
}
