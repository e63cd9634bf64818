#![doc = "docpipe-core: pipeline, plugins and module graph for docpipe."]

//! This crate holds everything except the command line: the shared
//! [`graph::ModuleGraph`], the plugin contracts in [`contract`], YAML
//! configuration in [`config`], the type-tag [`registry`], the built-in
//! plugins ([`load`], [`preprocess`], [`render`]) and the orchestrating
//! [`pipeline::Pipeline`].
//!
//! # Usage
//! ```no_run
//! use docpipe_core::pipeline::Pipeline;
//!
//! let mut pipeline = Pipeline::new();
//! pipeline.load_config("docpipe.yml")?;
//! pipeline.run()?;
//! # Ok::<(), docpipe_core::Error>(())
//! ```

pub mod config;
pub mod contract;
pub mod graph;
pub mod load;
pub mod pipeline;
pub mod preprocess;
pub mod registry;
pub mod render;
pub mod scan;

use thiserror::Error;

pub use config::{ConfigError, ConfigSource, PipelineConfig, PluginKind, PluginSpec};
pub use contract::{LoadError, Loader, ProcessError, Processor, RenderError, Renderer};
pub use graph::{Module, ModuleGraph, Object, ObjectKind};
pub use pipeline::Pipeline;
pub use registry::PluginRegistry;

/// Any failure of a pipeline stage, as returned by [`Pipeline::run`].
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Process(#[from] ProcessError),

    #[error(transparent)]
    Render(#[from] RenderError),
}
