///
/// This module implements the CLI interface for docpipe: command parsing,
/// mapping command line options onto a pipeline configuration, and running
/// the pipeline.
///
/// All pipeline logic (graph, plugins, configuration) lives in [`docpipe-core`].
/// This module is strictly CLI glue.
///
/// ## How To Use
/// - From a shell: `docpipe render --config docpipe.yml`, or
///   `docpipe render -I src -p mypackage --output docs/api.md`.
/// - Programmatically: call [`run`] with a constructed [`Cli`].
///
/// [`docpipe-core`]: ../../docpipe_core/
use crate::load_config::{build_config, SourceOptions};
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use docpipe_core::{Pipeline, PluginSpec};
use std::path::PathBuf;

/// CLI for docpipe: generate API documentation from Python sources.
#[derive(Parser)]
#[clap(
    name = "docpipe",
    version,
    about = "Generate Markdown API documentation from Python sources through a loader/processor/renderer pipeline"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

/// Where the modules come from.
#[derive(Args, Debug, Clone, Default)]
pub struct SourceArgs {
    /// Path to the YAML pipeline config file
    #[clap(long, short)]
    pub config: Option<PathBuf>,

    /// Module to document; may be repeated
    #[clap(long = "module", short = 'm')]
    pub modules: Vec<String>,

    /// Package to document together with its submodules; may be repeated
    #[clap(long = "package", short = 'p')]
    pub packages: Vec<String>,

    /// Directory to search for modules; may be repeated
    #[clap(long = "search-path", short = 'I')]
    pub search_path: Vec<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Load, process and render documentation
    Render {
        #[clap(flatten)]
        source: SourceArgs,

        /// Write the rendered output to this file instead of the configured destination
        #[clap(long, short)]
        output: Option<PathBuf>,
    },
    /// Load and process modules, then print the module graph as JSON
    Dump {
        #[clap(flatten)]
        source: SourceArgs,
    },
}

impl From<&SourceArgs> for SourceOptions {
    fn from(args: &SourceArgs) -> Self {
        SourceOptions {
            config: args.config.clone(),
            modules: args.modules.clone(),
            packages: args.packages.clone(),
            search_path: args.search_path.clone(),
        }
    }
}

/// CLI entrypoint for integration tests and main()
pub fn run(cli: Cli) -> Result<()> {
    // Emit a top-level 'trace_initialised' event at the very start
    tracing::info!("trace_initialised");

    match cli.command {
        Commands::Render { source, output } => {
            let mut config = build_config(&SourceOptions::from(&source))?;
            if let Some(output) = output {
                config
                    .renderer
                    .set_param("filename", output.to_string_lossy().into_owned());
            }
            tracing::info!(command = "render", renderer = %config.renderer.plugin_type, "Starting pipeline");

            let mut pipeline = Pipeline::new();
            pipeline
                .configure(config)
                .context("Invalid pipeline configuration")?;
            match pipeline.run() {
                Ok(()) => {
                    tracing::info!(
                        command = "render",
                        modules = pipeline.graph().modules.len(),
                        "Pipeline complete"
                    );
                    Ok(())
                }
                Err(e) => {
                    tracing::error!(command = "render", error = %e, "Pipeline failed");
                    Err(anyhow::Error::new(e))
                }
            }
        }
        Commands::Dump { source } => {
            let mut config = build_config(&SourceOptions::from(&source))?;
            config.renderer = PluginSpec::new("json");
            tracing::info!(command = "dump", "Starting pipeline");

            let mut pipeline = Pipeline::new();
            pipeline
                .configure(config)
                .context("Invalid pipeline configuration")?;
            pipeline.run().map_err(|e| {
                tracing::error!(command = "dump", error = %e, "Pipeline failed");
                anyhow::Error::new(e)
            })
        }
    }
}
