//! Built-in loaders.
//!
//! `python`: resolves module and package names against a search path, reads
//! each `.py` file and appends the scanned [`Module`](crate::graph::Module)s to
//! the graph. With no modules or packages configured it loads every `.py`
//! file found below the search path.

use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

use crate::config::PluginSpec;
use crate::contract::{LoadError, Loader};
use crate::graph::ModuleGraph;
use crate::registry::{PluginError, PluginRegistry};
use crate::scan;

pub fn register(registry: &mut PluginRegistry) {
    registry.register_loader("python", |spec| {
        let loader = PythonLoader::from_spec(spec)?;
        Ok(Box::new(loader))
    });
}

/// Options of the `python` loader.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PythonLoaderOptions {
    /// Directories searched, in order, for modules and packages.
    pub search_path: Vec<PathBuf>,
    /// Dotted names of single modules to load.
    pub modules: Vec<String>,
    /// Dotted names of packages to load together with all their submodules.
    pub packages: Vec<String>,
}

impl Default for PythonLoaderOptions {
    fn default() -> Self {
        Self {
            search_path: vec![PathBuf::from(".")],
            modules: Vec::new(),
            packages: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PythonLoader {
    options: PythonLoaderOptions,
}

impl PythonLoader {
    pub fn new(options: PythonLoaderOptions) -> Self {
        Self { options }
    }

    pub fn from_spec(spec: &PluginSpec) -> Result<Self, PluginError> {
        Ok(Self::new(spec.params()?))
    }

    /// Maps the configured names to `(module name, file)` pairs, in load order.
    pub fn resolve(&self) -> Result<Vec<(String, PathBuf)>, LoadError> {
        let mut found: Vec<(String, PathBuf)> = Vec::new();

        if self.options.modules.is_empty() && self.options.packages.is_empty() {
            for dir in &self.options.search_path {
                debug!(dir = %dir.display(), "Discovering modules in search directory");
                discover(dir, None, &mut found)?;
            }
        } else {
            for name in &self.options.modules {
                let path = self.find_module(name).ok_or_else(|| self.not_found(name))?;
                found.push((name.clone(), path));
            }
            for name in &self.options.packages {
                self.resolve_package(name, &mut found)?;
            }
        }

        let mut seen = HashSet::new();
        found.retain(|(name, _)| seen.insert(name.clone()));
        Ok(found)
    }

    fn find_module(&self, name: &str) -> Option<PathBuf> {
        let rel = module_rel_path(name);
        self.options.search_path.iter().find_map(|dir| {
            let file = dir.join(&rel).with_extension("py");
            if file.is_file() {
                return Some(file);
            }
            let init = dir.join(&rel).join("__init__.py");
            init.is_file().then_some(init)
        })
    }

    fn resolve_package(&self, name: &str, found: &mut Vec<(String, PathBuf)>) -> Result<(), LoadError> {
        let rel = module_rel_path(name);
        for dir in &self.options.search_path {
            let package_dir = dir.join(&rel);
            if package_dir.join("__init__.py").is_file() {
                found.push((name.to_string(), package_dir.join("__init__.py")));
                return discover(&package_dir, Some(name), found);
            }
            let file = package_dir.with_extension("py");
            if file.is_file() {
                found.push((name.to_string(), file));
                return Ok(());
            }
        }
        Err(self.not_found(name))
    }

    fn not_found(&self, name: &str) -> LoadError {
        error!(module = name, search_path = ?self.options.search_path, "Module not found");
        LoadError::ModuleNotFound {
            name: name.to_string(),
            search_path: self.options.search_path.clone(),
        }
    }
}

impl Loader for PythonLoader {
    fn load(&self, graph: &mut ModuleGraph) -> Result<(), LoadError> {
        let resolved = self.resolve()?;
        info!(count = resolved.len(), "Loading python modules");

        for (name, path) in resolved {
            let source = fs::read_to_string(&path).map_err(|e| {
                error!(error = ?e, path = %path.display(), "Failed to read module source");
                LoadError::Io {
                    path: path.clone(),
                    source: e,
                }
            })?;
            let mut module = scan::parse_module(&name, &source);
            debug!(
                module = %name,
                path = %path.display(),
                members = module.members.len(),
                "Scanned module"
            );
            module.path = Some(path);
            graph.add_module(module);
        }
        Ok(())
    }
}

fn module_rel_path(name: &str) -> PathBuf {
    name.split('.').collect()
}

/// Recursively collects modules below `dir`. `prefix` is the dotted name of
/// the package `dir` represents, if any.
fn discover(dir: &Path, prefix: Option<&str>, found: &mut Vec<(String, PathBuf)>) -> Result<(), LoadError> {
    let io_err = |e: std::io::Error| {
        error!(error = ?e, path = %dir.display(), "Failed to read directory");
        LoadError::Io {
            path: dir.to_path_buf(),
            source: e,
        }
    };

    let mut entries: Vec<PathBuf> = fs::read_dir(dir)
        .map_err(io_err)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<Result<_, _>>()
        .map_err(io_err)?;
    entries.sort();

    let qualify = |stem: &str| match prefix {
        Some(prefix) => format!("{prefix}.{stem}"),
        None => stem.to_string(),
    };

    for path in entries {
        let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if path.is_dir() {
            // Skip hidden and bytecode directories
            if file_name.starts_with('.') || file_name == "__pycache__" {
                debug!(path = %path.display(), "Skipping directory");
                continue;
            }
            let init = path.join("__init__.py");
            if !init.is_file() {
                debug!(path = %path.display(), "Skipping directory without __init__.py");
                continue;
            }
            let package = qualify(file_name);
            found.push((package.clone(), init));
            discover(&path, Some(&package), found)?;
        } else if let Some(stem) = file_name.strip_suffix(".py") {
            if stem == "__init__" || stem.is_empty() {
                continue;
            }
            found.push((qualify(stem), path.clone()));
        }
    }
    Ok(())
}
