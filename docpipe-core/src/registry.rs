//! Type tag → constructor lookup for each plugin role.
//!
//! The pipeline only reads from a registry. Entries are added by whoever
//! assembles it: [`PluginRegistry::builtin`] registers the plugins shipped in
//! this crate, and callers can register their own on top before handing the
//! registry to [`Pipeline::with_registry`](crate::pipeline::Pipeline::with_registry).

use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use crate::config::{PluginKind, PluginSpec};
use crate::contract::{Loader, Processor, Renderer};
use crate::{load, preprocess, render};

/// Error a constructor reports for unusable parameters.
pub type PluginError = Box<dyn std::error::Error + Send + Sync>;

pub type LoaderFactory = Arc<dyn Fn(&PluginSpec) -> Result<Box<dyn Loader>, PluginError> + Send + Sync>;
pub type ProcessorFactory =
    Arc<dyn Fn(&PluginSpec) -> Result<Box<dyn Processor>, PluginError> + Send + Sync>;
pub type RendererFactory =
    Arc<dyn Fn(&PluginSpec) -> Result<Box<dyn Renderer>, PluginError> + Send + Sync>;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("no {kind} registered for type {type_name:?}")]
    Unknown { kind: PluginKind, type_name: String },

    #[error("invalid parameters for {kind} {type_name:?}: {source}")]
    Invalid {
        kind: PluginKind,
        type_name: String,
        #[source]
        source: PluginError,
    },
}

#[derive(Default, Clone)]
pub struct PluginRegistry {
    loaders: HashMap<String, LoaderFactory>,
    processors: HashMap<String, ProcessorFactory>,
    renderers: HashMap<String, RendererFactory>,
}

impl PluginRegistry {
    /// A registry with no entries at all.
    pub fn empty() -> Self {
        Self::default()
    }

    /// A registry holding every plugin shipped with this crate.
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        load::register(&mut registry);
        preprocess::register(&mut registry);
        render::register(&mut registry);
        registry
    }

    pub fn register_loader<F>(&mut self, tag: &str, factory: F) -> &mut Self
    where
        F: Fn(&PluginSpec) -> Result<Box<dyn Loader>, PluginError> + Send + Sync + 'static,
    {
        debug!(kind = "loader", tag, "Registering plugin");
        self.loaders.insert(tag.to_string(), Arc::new(factory));
        self
    }

    pub fn register_processor<F>(&mut self, tag: &str, factory: F) -> &mut Self
    where
        F: Fn(&PluginSpec) -> Result<Box<dyn Processor>, PluginError> + Send + Sync + 'static,
    {
        debug!(kind = "processor", tag, "Registering plugin");
        self.processors.insert(tag.to_string(), Arc::new(factory));
        self
    }

    pub fn register_renderer<F>(&mut self, tag: &str, factory: F) -> &mut Self
    where
        F: Fn(&PluginSpec) -> Result<Box<dyn Renderer>, PluginError> + Send + Sync + 'static,
    {
        debug!(kind = "renderer", tag, "Registering plugin");
        self.renderers.insert(tag.to_string(), Arc::new(factory));
        self
    }

    pub fn contains(&self, kind: PluginKind, tag: &str) -> bool {
        match kind {
            PluginKind::Loader => self.loaders.contains_key(tag),
            PluginKind::Processor => self.processors.contains_key(tag),
            PluginKind::Renderer => self.renderers.contains_key(tag),
        }
    }

    /// Registered tags for one role, sorted.
    pub fn tags(&self, kind: PluginKind) -> Vec<&str> {
        let mut tags: Vec<&str> = match kind {
            PluginKind::Loader => self.loaders.keys().map(String::as_str).collect(),
            PluginKind::Processor => self.processors.keys().map(String::as_str).collect(),
            PluginKind::Renderer => self.renderers.keys().map(String::as_str).collect(),
        };
        tags.sort_unstable();
        tags
    }

    pub fn build_loader(&self, spec: &PluginSpec) -> Result<Box<dyn Loader>, BuildError> {
        build(&self.loaders, PluginKind::Loader, spec)
    }

    pub fn build_processor(&self, spec: &PluginSpec) -> Result<Box<dyn Processor>, BuildError> {
        build(&self.processors, PluginKind::Processor, spec)
    }

    pub fn build_renderer(&self, spec: &PluginSpec) -> Result<Box<dyn Renderer>, BuildError> {
        build(&self.renderers, PluginKind::Renderer, spec)
    }
}

fn build<T: ?Sized>(
    table: &HashMap<String, Arc<dyn Fn(&PluginSpec) -> Result<Box<T>, PluginError> + Send + Sync>>,
    kind: PluginKind,
    spec: &PluginSpec,
) -> Result<Box<T>, BuildError> {
    let factory = table.get(&spec.plugin_type).ok_or_else(|| BuildError::Unknown {
        kind,
        type_name: spec.plugin_type.clone(),
    })?;
    factory(spec).map_err(|source| BuildError::Invalid {
        kind,
        type_name: spec.plugin_type.clone(),
        source,
    })
}
