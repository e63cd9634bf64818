//! In-memory documentation tree shared by every pipeline stage.
//!
//! Loaders append [`Module`]s, processors rewrite or prune them in place and
//! renderers read the final state. There is exactly one graph per
//! [`crate::pipeline::Pipeline`]; stages receive it by `&mut` one after the
//! other, so no locking is involved.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// The whole documentation tree: an ordered list of modules.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModuleGraph {
    pub modules: Vec<Module>,
}

/// A single source module (e.g. one `.py` file).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Module {
    /// Dotted module name, e.g. `package.sub`.
    pub name: String,
    /// File the module was read from, when it came from disk.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docstring: Option<String>,
    #[serde(default)]
    pub members: Vec<Object>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectKind {
    Class,
    Function,
    Method,
    Data,
}

/// A documented entity below module level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Object {
    pub name: String,
    pub kind: ObjectKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docstring: Option<String>,
    /// Parameter list and return annotation for callables, `= value` text for data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub decorators: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bases: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub members: Vec<Object>,
}

impl ModuleGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    pub fn add_module(&mut self, module: Module) {
        self.modules.push(module);
    }

    pub fn module(&self, name: &str) -> Option<&Module> {
        self.modules.iter().find(|m| m.name == name)
    }

    /// Total number of objects below module level, across all modules.
    pub fn object_count(&self) -> usize {
        fn count(objects: &[Object]) -> usize {
            objects.iter().map(|o| 1 + count(&o.members)).sum()
        }
        self.modules.iter().map(|m| count(&m.members)).sum()
    }

    /// Applies `f` to every docstring slot in the graph, modules included.
    pub fn for_each_docstring_mut<F>(&mut self, mut f: F)
    where
        F: FnMut(&mut Option<String>),
    {
        fn walk<F: FnMut(&mut Option<String>)>(objects: &mut [Object], f: &mut F) {
            for object in objects {
                f(&mut object.docstring);
                walk(&mut object.members, f);
            }
        }
        for module in &mut self.modules {
            f(&mut module.docstring);
            walk(&mut module.members, &mut f);
        }
    }
}

impl Module {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: None,
            docstring: None,
            members: Vec::new(),
        }
    }
}

impl Object {
    pub fn new(name: impl Into<String>, kind: ObjectKind) -> Self {
        Self {
            name: name.into(),
            kind,
            docstring: None,
            signature: None,
            decorators: Vec::new(),
            bases: Vec::new(),
            members: Vec::new(),
        }
    }

    pub fn has_docstring(&self) -> bool {
        self.docstring
            .as_deref()
            .map(|d| !d.trim().is_empty())
            .unwrap_or(false)
    }

    /// `__name__` style names.
    pub fn is_special(&self) -> bool {
        self.name.len() > 4 && self.name.starts_with("__") && self.name.ends_with("__")
    }

    /// Leading underscore, but not a special name.
    pub fn is_private(&self) -> bool {
        self.name.starts_with('_') && !self.is_special()
    }
}
