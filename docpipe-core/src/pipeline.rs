//! High-level pipeline: orchestrates load → process → render over one module graph.
//!
//! [`Pipeline`] owns an ordered list of [`Loader`]s, an ordered list of
//! [`Processor`]s, a single [`Renderer`] and exactly one [`ModuleGraph`]. Each
//! stage method lends the graph to its plugins one after another:
//!
//!   - [`Pipeline::load_modules`]: every loader, in configured order
//!   - [`Pipeline::process`]: every processor, in configured order
//!   - [`Pipeline::render`]: the renderer's own `process` pass, then `render`
//!
//! # Responsibilities
//! - Fail-fast: the first plugin error stops the stage and is returned as-is
//! - No rollback: mutations already applied to the graph stay visible
//! - Logging around every plugin call for traceability
//!
//! # Stage ordering
//! Stages are not guarded. Rendering before loading renders an empty graph,
//! and loading twice runs every loader twice against the same graph. Callers
//! that want a fresh run should build a fresh [`Pipeline`].

use std::sync::Arc;
use tracing::{error, info};

use crate::config::{ConfigError, ConfigSource, PipelineConfig, PluginSpec};
use crate::contract::{LoadError, Loader, ProcessError, Processor, RenderError, Renderer};
use crate::graph::ModuleGraph;
use crate::load::PythonLoader;
use crate::preprocess::{FilterProcessor, SmartProcessor};
use crate::registry::PluginRegistry;
use crate::render::MarkdownRenderer;
use crate::Error;

pub struct Pipeline {
    loaders: Vec<Box<dyn Loader>>,
    processors: Vec<Box<dyn Processor>>,
    renderer: Box<dyn Renderer>,
    config: PipelineConfig,
    graph: ModuleGraph,
    registry: Arc<PluginRegistry>,
}

/// Plugin instances resolved from a [`PipelineConfig`].
struct Resolved {
    loaders: Vec<Box<dyn Loader>>,
    processors: Vec<Box<dyn Processor>>,
    renderer: Box<dyn Renderer>,
}

impl Resolved {
    /// Fresh instances of the plugins [`PipelineConfig::default`] names.
    fn defaults() -> Self {
        Self {
            loaders: vec![Box::new(PythonLoader::default())],
            processors: vec![
                Box::new(SmartProcessor) as Box<dyn Processor>,
                Box::new(FilterProcessor::default()),
            ],
            renderer: Box::new(MarkdownRenderer::default()),
        }
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl Pipeline {
    /// A pipeline with the default plugins, resolving configured plugin types
    /// through the built-in registry.
    pub fn new() -> Self {
        Self::with_registry(Arc::new(PluginRegistry::builtin()))
    }

    /// A pipeline with the default plugins, resolving configured plugin types
    /// through `registry`.
    pub fn with_registry(registry: Arc<PluginRegistry>) -> Self {
        let defaults = Resolved::defaults();
        Self {
            loaders: defaults.loaders,
            processors: defaults.processors,
            renderer: defaults.renderer,
            config: PipelineConfig::default(),
            graph: ModuleGraph::new(),
            registry,
        }
    }

    /// Reads a configuration from a YAML file or an in-memory document and
    /// replaces the loaders, processors and renderer with the ones it names.
    ///
    /// The graph is left untouched. On error nothing is replaced.
    pub fn load_config(&mut self, source: impl Into<ConfigSource>) -> Result<PipelineConfig, ConfigError> {
        let config = PipelineConfig::from_source(source.into())?;
        self.configure(config)
    }

    /// Replaces the plugins with the ones named by an already-parsed config.
    pub fn configure(&mut self, config: PipelineConfig) -> Result<PipelineConfig, ConfigError> {
        let resolved = resolve(&self.registry, &config).map_err(|e| {
            error!(error = %e, "[PIPELINE] Failed to resolve configured plugins");
            e
        })?;
        self.loaders = resolved.loaders;
        self.processors = resolved.processors;
        self.renderer = resolved.renderer;
        self.config = config.clone();
        info!(
            loaders = self.loaders.len(),
            processors = self.processors.len(),
            renderer = %self.config.renderer.plugin_type,
            "[PIPELINE] Configuration applied"
        );
        Ok(config)
    }

    /// Runs every loader in order against the graph.
    pub fn load_modules(&mut self) -> Result<(), LoadError> {
        info!(count = self.loaders.len(), "[PIPELINE] Loading modules");
        for (idx, loader) in self.loaders.iter().enumerate() {
            let plugin = plugin_type(&self.config.loaders, idx);
            match loader.load(&mut self.graph) {
                Ok(()) => info!(loader = idx, plugin, modules = self.graph.modules.len(), "[PIPELINE] Loader finished"),
                Err(e) => {
                    error!(loader = idx, plugin, error = %e, "[PIPELINE][ERROR] Loader failed");
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    /// Runs every processor in order against the graph.
    pub fn process(&mut self) -> Result<(), ProcessError> {
        info!(count = self.processors.len(), "[PIPELINE] Processing module graph");
        for (idx, processor) in self.processors.iter().enumerate() {
            let plugin = plugin_type(&self.config.processors, idx);
            match processor.process(&mut self.graph) {
                Ok(()) => info!(processor = idx, plugin, "[PIPELINE] Processor finished"),
                Err(e) => {
                    error!(processor = idx, plugin, error = %e, "[PIPELINE][ERROR] Processor failed");
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    /// Runs the renderer's preparation pass, then renders.
    pub fn render(&mut self) -> Result<(), RenderError> {
        let plugin = self.config.renderer.plugin_type.as_str();
        info!(plugin, "[PIPELINE] Rendering");
        if let Err(e) = self.renderer.process(&mut self.graph) {
            error!(plugin, error = %e, "[PIPELINE][ERROR] Renderer preparation failed");
            return Err(e);
        }
        if let Err(e) = self.renderer.render(&self.graph) {
            error!(plugin, error = %e, "[PIPELINE][ERROR] Rendering failed");
            return Err(e);
        }
        info!(plugin, "[PIPELINE] Rendering complete");
        Ok(())
    }

    /// `load_modules`, `process` and `render`, stopping at the first failure.
    pub fn run(&mut self) -> Result<(), Error> {
        self.load_modules()?;
        self.process()?;
        self.render()?;
        Ok(())
    }

    pub fn graph(&self) -> &ModuleGraph {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut ModuleGraph {
        &mut self.graph
    }

    /// The configuration the current plugins were built from.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn loaders(&self) -> &[Box<dyn Loader>] {
        &self.loaders
    }

    pub fn processors(&self) -> &[Box<dyn Processor>] {
        &self.processors
    }

    pub fn renderer(&self) -> &dyn Renderer {
        self.renderer.as_ref()
    }

    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }
}

fn plugin_type(specs: &[PluginSpec], idx: usize) -> &str {
    specs.get(idx).map(|s| s.plugin_type.as_str()).unwrap_or("?")
}

fn resolve(registry: &PluginRegistry, config: &PipelineConfig) -> Result<Resolved, ConfigError> {
    let path = config.path.as_deref();

    let loaders = config
        .loaders
        .iter()
        .enumerate()
        .map(|(i, spec)| {
            registry
                .build_loader(spec)
                .map_err(|e| ConfigError::from_build(e, format!("loaders[{i}]"), path))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let processors = config
        .processors
        .iter()
        .enumerate()
        .map(|(i, spec)| {
            registry
                .build_processor(spec)
                .map_err(|e| ConfigError::from_build(e, format!("processors[{i}]"), path))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let renderer = registry
        .build_renderer(&config.renderer)
        .map_err(|e| ConfigError::from_build(e, "renderer".to_string(), path))?;

    Ok(Resolved {
        loaders,
        processors,
        renderer,
    })
}
