//! # contract: capability interfaces for pipeline plugins
//!
//! This module defines the three plugin roles the [`Pipeline`](crate::pipeline::Pipeline)
//! drives, in order, against one shared [`ModuleGraph`]:
//!
//! - [`Loader`]: discovers documentable entities and appends them to the graph.
//! - [`Processor`]: rewrites the graph in place (filtering, docstring conversion).
//! - [`Renderer`]: runs its own preparation pass over the graph, then emits output.
//!
//! ## Mocking & Testing
//! - Every trait is annotated for `mockall`, so `MockLoader`, `MockProcessor` and
//!   `MockRenderer` are available to tests (and to downstream crates with the
//!   `test-export-mocks` feature, on by default).
//!
//! ## Adding New Plugins
//! - Implement the trait, then register a constructor for it in a
//!   [`PluginRegistry`](crate::registry::PluginRegistry) under a type tag.
//! - Return the stage error type of the trait; the pipeline never catches it.

use mockall::automock;
use std::path::PathBuf;
use thiserror::Error;

use crate::graph::ModuleGraph;

/// Failure while populating the graph.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("module {name:?} not found in search path {search_path:?}")]
    ModuleNotFound {
        name: String,
        search_path: Vec<PathBuf>,
    },

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    Other(String),
}

/// Failure while transforming the graph.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("processor {processor}: {message}")]
    Failed { processor: String, message: String },

    #[error("{0}")]
    Other(String),
}

/// Failure while preparing or emitting output.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to write {}: {source}", output_target(.path))]
    Io {
        path: Option<PathBuf>,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize module graph: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

fn output_target(path: &Option<PathBuf>) -> String {
    match path {
        Some(path) => path.display().to_string(),
        None => "<stdout>".to_string(),
    }
}

/// Populates or extends the shared graph. Side-effect only.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
pub trait Loader: Send + Sync {
    fn load(&self, graph: &mut ModuleGraph) -> Result<(), LoadError>;
}

/// Transforms the shared graph in place.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
pub trait Processor: Send + Sync {
    fn process(&self, graph: &mut ModuleGraph) -> Result<(), ProcessError>;
}

/// Produces the externally visible output.
///
/// Rendering is a two-step contract: [`Renderer::process`] is a final
/// format-specific pass over the graph that runs after every configured
/// [`Processor`], then [`Renderer::render`] emits the result.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
pub trait Renderer: Send + Sync {
    fn process(&self, graph: &mut ModuleGraph) -> Result<(), RenderError>;

    fn render(&self, graph: &ModuleGraph) -> Result<(), RenderError>;
}
