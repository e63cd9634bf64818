//! Built-in renderers.
//!
//! `markdown` writes one Markdown document for the whole graph; `json` dumps
//! the graph itself. Both write to `filename` when set and to stdout otherwise.

use serde::Deserialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

use crate::contract::{RenderError, Renderer};
use crate::graph::{Module, ModuleGraph, Object, ObjectKind};
use crate::registry::PluginRegistry;

pub fn register(registry: &mut PluginRegistry) {
    registry
        .register_renderer("markdown", |spec| {
            Ok(Box::new(MarkdownRenderer::new(spec.params()?)))
        })
        .register_renderer("json", |spec| Ok(Box::new(JsonRenderer::new(spec.params()?))));
}

/// Writes `content` to `filename`, creating parent directories, or to stdout.
pub fn write_output(filename: Option<&Path>, content: &str) -> Result<(), RenderError> {
    match filename {
        Some(path) => {
            let io_err = |e: std::io::Error| {
                error!(error = ?e, path = %path.display(), "Failed to write rendered output");
                RenderError::Io {
                    path: Some(path.to_path_buf()),
                    source: e,
                }
            };
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent).map_err(io_err)?;
            }
            fs::write(path, content).map_err(io_err)?;
            info!(path = %path.display(), bytes = content.len(), "Wrote rendered output");
        }
        None => {
            let stdout = std::io::stdout();
            let mut handle = stdout.lock();
            handle
                .write_all(content.as_bytes())
                .and_then(|_| handle.flush())
                .map_err(|e| RenderError::Io { path: None, source: e })?;
            debug!(bytes = content.len(), "Wrote rendered output to stdout");
        }
    }
    Ok(())
}

/// Options of the `markdown` renderer.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MarkdownOptions {
    pub filename: Option<PathBuf>,
    pub render_toc: bool,
    pub insert_header_anchors: bool,
    /// Title classes as `Name Objects` instead of `Name`.
    pub descriptive_class_title: bool,
    /// Title methods as `Class.method`.
    pub add_method_class_prefix: bool,
    /// Show signatures in a `python` code block rather than in the header.
    pub signature_code_block: bool,
    pub sort_members: bool,
}

impl Default for MarkdownOptions {
    fn default() -> Self {
        Self {
            filename: None,
            render_toc: false,
            insert_header_anchors: true,
            descriptive_class_title: true,
            add_method_class_prefix: true,
            signature_code_block: true,
            sort_members: false,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MarkdownRenderer {
    options: MarkdownOptions,
}

impl MarkdownRenderer {
    pub fn new(options: MarkdownOptions) -> Self {
        Self { options }
    }

    /// The full Markdown document for `graph`.
    pub fn render_to_string(&self, graph: &ModuleGraph) -> String {
        let mut blocks: Vec<String> = Vec::new();
        if self.options.render_toc && !graph.modules.is_empty() {
            blocks.push(self.toc(graph));
        }
        for module in &graph.modules {
            self.render_module(module, &mut blocks);
        }
        let mut out = blocks.join("\n\n");
        if !out.is_empty() {
            out.push('\n');
        }
        out
    }

    fn toc(&self, graph: &ModuleGraph) -> String {
        fn entries(r: &MarkdownRenderer, objects: &[Object], path: &str, class: Option<&str>, depth: usize, lines: &mut Vec<String>) {
            for object in objects {
                let full = format!("{path}.{}", object.name);
                lines.push(format!(
                    "{}* [{}](#{})",
                    "  ".repeat(depth),
                    escape(&r.title(object, class)),
                    full
                ));
                let class = (object.kind == ObjectKind::Class).then_some(object.name.as_str());
                entries(r, &object.members, &full, class, depth + 1, lines);
            }
        }

        let mut lines = vec!["**Table of Contents**".to_string(), String::new()];
        for module in &graph.modules {
            lines.push(format!("* [{}](#{})", escape(&module.name), module.name));
            entries(self, &module.members, &module.name, None, 1, &mut lines);
        }
        lines.join("\n")
    }

    fn render_module(&self, module: &Module, blocks: &mut Vec<String>) {
        self.header(blocks, 1, &module.name, &module.name);
        if let Some(doc) = module.docstring.as_deref().filter(|d| !d.trim().is_empty()) {
            blocks.push(doc.to_string());
        }
        for member in &module.members {
            self.render_object(member, &module.name, None, blocks);
        }
    }

    fn render_object(&self, object: &Object, path: &str, class: Option<&str>, blocks: &mut Vec<String>) {
        let full = format!("{path}.{}", object.name);
        let level = match object.kind {
            ObjectKind::Class => 2,
            _ => 4,
        };

        let mut title = self.title(object, class);
        if !self.options.signature_code_block {
            if let Some(sig) = object.signature.as_deref() {
                match object.kind {
                    ObjectKind::Function | ObjectKind::Method => title.push_str(sig),
                    _ => {}
                }
            }
        }
        self.header(blocks, level, &title, &full);

        if self.options.signature_code_block {
            blocks.push(format!("```python\n{}\n```", code_line(object)));
        }
        if let Some(doc) = object.docstring.as_deref().filter(|d| !d.trim().is_empty()) {
            blocks.push(doc.to_string());
        }

        let class = (object.kind == ObjectKind::Class).then_some(object.name.as_str());
        for member in &object.members {
            self.render_object(member, &full, class, blocks);
        }
    }

    fn title(&self, object: &Object, class: Option<&str>) -> String {
        match (object.kind, class) {
            (ObjectKind::Class, _) if self.options.descriptive_class_title => {
                format!("{} Objects", object.name)
            }
            (ObjectKind::Method, Some(class)) if self.options.add_method_class_prefix => {
                format!("{class}.{}", object.name)
            }
            _ => object.name.clone(),
        }
    }

    fn header(&self, blocks: &mut Vec<String>, level: usize, title: &str, anchor: &str) {
        let header = format!("{} {}", "#".repeat(level), escape(title));
        if self.options.insert_header_anchors {
            blocks.push(format!("<a name=\"{anchor}\"></a>\n{header}"));
        } else {
            blocks.push(header);
        }
    }
}

fn code_line(object: &Object) -> String {
    let mut lines: Vec<String> = object.decorators.iter().map(|d| format!("@{d}")).collect();
    let sig = object.signature.as_deref().unwrap_or("");
    lines.push(match object.kind {
        ObjectKind::Class if object.bases.is_empty() => format!("class {}", object.name),
        ObjectKind::Class => format!("class {}({})", object.name, object.bases.join(", ")),
        ObjectKind::Function | ObjectKind::Method => {
            let sig = if sig.is_empty() { "()" } else { sig };
            format!("def {}{}", object.name, sig)
        }
        ObjectKind::Data if sig.starts_with(':') => format!("{}{}", object.name, sig),
        ObjectKind::Data if sig.is_empty() => object.name.clone(),
        ObjectKind::Data => format!("{} {}", object.name, sig),
    });
    lines.join("\n")
}

fn escape(text: &str) -> String {
    text.replace('_', "\\_").replace('*', "\\*")
}

fn sort_objects(objects: &mut [Object]) {
    objects.sort_by(|a, b| a.name.cmp(&b.name));
    for object in objects {
        sort_objects(&mut object.members);
    }
}

impl Renderer for MarkdownRenderer {
    fn process(&self, graph: &mut ModuleGraph) -> Result<(), RenderError> {
        graph.for_each_docstring_mut(|doc| {
            if let Some(text) = doc.as_mut() {
                *text = text
                    .lines()
                    .map(str::trim_end)
                    .collect::<Vec<_>>()
                    .join("\n")
                    .trim_end()
                    .to_string();
            }
        });
        if self.options.sort_members {
            for module in &mut graph.modules {
                sort_objects(&mut module.members);
            }
        }
        Ok(())
    }

    fn render(&self, graph: &ModuleGraph) -> Result<(), RenderError> {
        let content = self.render_to_string(graph);
        info!(
            modules = graph.modules.len(),
            objects = graph.object_count(),
            "Rendering markdown"
        );
        write_output(self.options.filename.as_deref(), &content)
    }
}

/// Options of the `json` renderer.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct JsonOptions {
    pub filename: Option<PathBuf>,
    pub pretty: bool,
}

impl Default for JsonOptions {
    fn default() -> Self {
        Self {
            filename: None,
            pretty: true,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct JsonRenderer {
    options: JsonOptions,
}

impl JsonRenderer {
    pub fn new(options: JsonOptions) -> Self {
        Self { options }
    }

    pub fn render_to_string(&self, graph: &ModuleGraph) -> Result<String, RenderError> {
        let mut json = if self.options.pretty {
            serde_json::to_string_pretty(graph)?
        } else {
            serde_json::to_string(graph)?
        };
        json.push('\n');
        Ok(json)
    }
}

impl Renderer for JsonRenderer {
    fn process(&self, _graph: &mut ModuleGraph) -> Result<(), RenderError> {
        Ok(())
    }

    fn render(&self, graph: &ModuleGraph) -> Result<(), RenderError> {
        let content = self.render_to_string(graph)?;
        write_output(self.options.filename.as_deref(), &content)
    }
}
