//! Built-in processors: graph filtering and docstring conversion.
//!
//! - `filter`: drops private, special and undocumented objects and empty modules.
//! - `sphinx`: turns `:param x:` style fields into Markdown sections.
//! - `google`: turns `Args:` / `Returns:` style sections into Markdown sections.
//! - `pydocmd`: turns `# Arguments` style headings into Markdown sections.
//! - `smart`: picks one of the three conversions per docstring.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use tracing::{debug, info};

use crate::config::PluginSpec;
use crate::contract::{ProcessError, Processor};
use crate::graph::{Module, ModuleGraph, Object};
use crate::registry::{PluginError, PluginRegistry};

pub fn register(registry: &mut PluginRegistry) {
    registry
        .register_processor("filter", |spec| {
            Ok(Box::new(FilterProcessor::new(spec.params()?)))
        })
        .register_processor("smart", |spec| {
            no_options(spec)?;
            Ok(Box::new(SmartProcessor))
        })
        .register_processor("sphinx", |spec| {
            no_options(spec)?;
            Ok(Box::new(DocstringProcessor::new(DocstringStyle::Sphinx)))
        })
        .register_processor("google", |spec| {
            no_options(spec)?;
            Ok(Box::new(DocstringProcessor::new(DocstringStyle::Google)))
        })
        .register_processor("pydocmd", |spec| {
            no_options(spec)?;
            Ok(Box::new(DocstringProcessor::new(DocstringStyle::Pydocmd)))
        });
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct NoOptions {}

fn no_options(spec: &PluginSpec) -> Result<(), PluginError> {
    let _: NoOptions = spec.params()?;
    Ok(())
}

/// Options of the `filter` processor.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FilterOptions {
    /// Remove objects without a docstring, unless one of their members survives.
    pub documented_only: bool,
    /// Remove `_private` names.
    pub exclude_private: bool,
    /// Remove `__special__` names.
    pub exclude_special: bool,
    /// Exempt modules from `documented_only`.
    pub do_not_filter_modules: bool,
    /// Remove modules left with neither docstring nor members.
    pub skip_empty_modules: bool,
}

impl Default for FilterOptions {
    fn default() -> Self {
        Self {
            documented_only: true,
            exclude_private: true,
            exclude_special: true,
            do_not_filter_modules: true,
            skip_empty_modules: true,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FilterProcessor {
    options: FilterOptions,
}

impl FilterProcessor {
    pub fn new(options: FilterOptions) -> Self {
        Self { options }
    }

    fn filter_objects(&self, objects: Vec<Object>) -> Vec<Object> {
        objects
            .into_iter()
            .filter_map(|mut object| {
                if self.options.exclude_private && object.is_private() {
                    return None;
                }
                if self.options.exclude_special && object.is_special() {
                    return None;
                }
                object.members = self.filter_objects(std::mem::take(&mut object.members));
                if self.options.documented_only && !object.has_docstring() && object.members.is_empty() {
                    return None;
                }
                Some(object)
            })
            .collect()
    }

    fn keep_module(&self, module: &Module) -> bool {
        let documented = module
            .docstring
            .as_deref()
            .map(|d| !d.trim().is_empty())
            .unwrap_or(false);
        if self.options.documented_only && !self.options.do_not_filter_modules && !documented {
            return false;
        }
        if self.options.skip_empty_modules && !documented && module.members.is_empty() {
            return false;
        }
        true
    }
}

impl Processor for FilterProcessor {
    fn process(&self, graph: &mut ModuleGraph) -> Result<(), ProcessError> {
        let before = graph.object_count();
        for module in &mut graph.modules {
            module.members = self.filter_objects(std::mem::take(&mut module.members));
        }
        let modules_before = graph.modules.len();
        graph.modules.retain(|m| self.keep_module(m));
        info!(
            objects_removed = before - graph.object_count(),
            modules_removed = modules_before - graph.modules.len(),
            "Filtered module graph"
        );
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocstringStyle {
    Sphinx,
    Google,
    Pydocmd,
}

/// Applies one fixed docstring conversion to every docstring in the graph.
#[derive(Debug, Clone)]
pub struct DocstringProcessor {
    style: DocstringStyle,
}

impl DocstringProcessor {
    pub fn new(style: DocstringStyle) -> Self {
        Self { style }
    }
}

impl Processor for DocstringProcessor {
    fn process(&self, graph: &mut ModuleGraph) -> Result<(), ProcessError> {
        let mut converted = 0usize;
        graph.for_each_docstring_mut(|doc| {
            if let Some(text) = doc.as_mut() {
                *text = convert(self.style, text);
                converted += 1;
            }
        });
        debug!(style = ?self.style, converted, "Converted docstrings");
        Ok(())
    }
}

/// Detects the style of each docstring and converts it accordingly.
#[derive(Debug, Clone, Default)]
pub struct SmartProcessor;

impl Processor for SmartProcessor {
    fn process(&self, graph: &mut ModuleGraph) -> Result<(), ProcessError> {
        let mut counts = [0usize; 3];
        graph.for_each_docstring_mut(|doc| {
            let Some(text) = doc.as_mut() else {
                return;
            };
            if let Some(style) = detect_style(text) {
                counts[style as usize] += 1;
                *text = convert(style, text);
            }
        });
        debug!(
            sphinx = counts[DocstringStyle::Sphinx as usize],
            google = counts[DocstringStyle::Google as usize],
            pydocmd = counts[DocstringStyle::Pydocmd as usize],
            "Smart docstring conversion done"
        );
        Ok(())
    }
}

static SPHINX_FIELD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^\s*:(?P<field>param|parameter|arg|argument|key|keyword|type|raises|raise|except|exception|returns|return|rtype|yields|yield)(?:\s+(?P<arg>[^:]+))?:\s*(?P<desc>.*)$",
    )
    .unwrap()
});

static GOOGLE_SECTION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?P<title>Args|Arguments|Parameters|Params|Returns|Return|Yields|Yield|Raises|Attributes|Example|Examples|Note|Notes|Todo|Warning|Warnings):\s*$",
    )
    .unwrap()
});

static PYDOCMD_SECTION_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^#\s+(?P<title>\S.*?)\s*$").unwrap());

static ENTRY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<name>[\w.*]+)\s*(?:\((?P<type>[^)]*)\))?\s*:\s*(?P<desc>.*)$").unwrap()
});

pub fn detect_style(doc: &str) -> Option<DocstringStyle> {
    if doc.lines().any(|l| SPHINX_FIELD_RE.is_match(l)) {
        Some(DocstringStyle::Sphinx)
    } else if doc.lines().any(|l| GOOGLE_SECTION_RE.is_match(l)) {
        Some(DocstringStyle::Google)
    } else if doc.lines().any(|l| PYDOCMD_SECTION_RE.is_match(l)) {
        Some(DocstringStyle::Pydocmd)
    } else {
        None
    }
}

pub fn convert(style: DocstringStyle, doc: &str) -> String {
    match style {
        DocstringStyle::Sphinx => sphinx_to_markdown(doc),
        DocstringStyle::Google => google_to_markdown(doc),
        DocstringStyle::Pydocmd => pydocmd_to_markdown(doc),
    }
}

#[derive(Debug, Default)]
struct Entry {
    name: String,
    ty: Option<String>,
    desc: String,
}

impl Entry {
    fn to_markdown(&self) -> String {
        let mut line = format!("- `{}`", self.name);
        if let Some(ty) = self.ty.as_deref().filter(|t| !t.is_empty()) {
            line.push_str(&format!(" (`{ty}`)"));
        }
        if !self.desc.is_empty() {
            line.push_str(": ");
            line.push_str(&self.desc);
        }
        line
    }
}

fn push_section(out: &mut String, title: &str, body: &str) {
    if body.trim().is_empty() {
        return;
    }
    if !out.is_empty() {
        out.push_str("\n\n");
    }
    out.push_str(&format!("**{title}**:\n\n{}", body.trim_end()));
}

fn entries_markdown(entries: &[Entry]) -> String {
    entries.iter().map(Entry::to_markdown).collect::<Vec<_>>().join("\n")
}

fn append_desc(desc: &mut String, more: &str) {
    let more = more.trim();
    if more.is_empty() {
        return;
    }
    if !desc.is_empty() {
        desc.push(' ');
    }
    desc.push_str(more);
}

pub fn sphinx_to_markdown(doc: &str) -> String {
    #[derive(Clone, Copy)]
    enum Last {
        None,
        Param,
        Raise,
        Returns,
    }

    let mut body: Vec<&str> = Vec::new();
    let mut params: Vec<Entry> = Vec::new();
    let mut raises: Vec<Entry> = Vec::new();
    let mut returns = String::new();
    let mut rtype: Option<String> = None;
    let mut last = Last::None;

    for line in doc.lines() {
        if let Some(caps) = SPHINX_FIELD_RE.captures(line) {
            let arg = caps.name("arg").map(|m| m.as_str().trim()).unwrap_or("");
            let desc = caps["desc"].trim().to_string();
            match &caps["field"] {
                "param" | "parameter" | "arg" | "argument" | "key" | "keyword" => {
                    // `:param int x:` carries the type before the name
                    let mut words: Vec<&str> = arg.split_whitespace().collect();
                    let name = words.pop().unwrap_or("").to_string();
                    let ty = (!words.is_empty()).then(|| words.join(" "));
                    match params.iter_mut().find(|p| p.name == name) {
                        Some(existing) => {
                            existing.desc = desc;
                            if ty.is_some() {
                                existing.ty = ty;
                            }
                        }
                        None => params.push(Entry { name, ty, desc }),
                    }
                    last = Last::Param;
                }
                "type" => {
                    match params.iter_mut().find(|p| p.name == arg) {
                        Some(existing) => existing.ty = Some(desc),
                        None => params.push(Entry {
                            name: arg.to_string(),
                            ty: Some(desc),
                            desc: String::new(),
                        }),
                    }
                    last = Last::None;
                }
                "raises" | "raise" | "except" | "exception" => {
                    raises.push(Entry {
                        name: arg.to_string(),
                        ty: None,
                        desc,
                    });
                    last = Last::Raise;
                }
                "returns" | "return" | "yields" | "yield" => {
                    returns = desc;
                    last = Last::Returns;
                }
                "rtype" => {
                    rtype = Some(desc);
                    last = Last::None;
                }
                _ => {}
            }
            continue;
        }

        let continuation = line.starts_with(char::is_whitespace) && !line.trim().is_empty();
        match last {
            Last::Param if continuation => {
                if let Some(p) = params.last_mut() {
                    append_desc(&mut p.desc, line);
                }
            }
            Last::Raise if continuation => {
                if let Some(r) = raises.last_mut() {
                    append_desc(&mut r.desc, line);
                }
            }
            Last::Returns if continuation => append_desc(&mut returns, line),
            _ => {
                last = Last::None;
                body.push(line);
            }
        }
    }

    let mut out = body.join("\n").trim_end().to_string();
    push_section(&mut out, "Arguments", &entries_markdown(&params));
    let returns_body = match (rtype, returns.is_empty()) {
        (Some(ty), true) => format!("`{ty}`"),
        (Some(ty), false) => format!("`{ty}`: {returns}"),
        (None, _) => returns,
    };
    push_section(&mut out, "Returns", &returns_body);
    push_section(&mut out, "Raises", &entries_markdown(&raises));
    out
}

fn section_title(raw: &str) -> &str {
    match raw {
        "Args" | "Arguments" | "Parameters" | "Params" => "Arguments",
        "Returns" | "Return" => "Returns",
        "Yields" | "Yield" => "Yields",
        "Example" | "Examples" => "Examples",
        "Note" | "Notes" => "Notes",
        "Warning" | "Warnings" => "Warnings",
        other => other,
    }
}

fn is_entry_section(title: &str) -> bool {
    matches!(title, "Arguments" | "Raises" | "Attributes")
}

/// Converts indented section lines into a list of entries, or dedented text.
fn section_body(title: &str, lines: &[&str]) -> String {
    let indent_of = |l: &str| l.chars().take_while(|c| c.is_whitespace()).count();
    let margin = lines
        .iter()
        .filter(|l| !l.trim().is_empty())
        .map(|l| indent_of(l))
        .min()
        .unwrap_or(0);

    if !is_entry_section(title) {
        let dedented: Vec<String> = lines
            .iter()
            .map(|l| l.chars().skip(margin).collect::<String>())
            .collect();
        return dedented.join("\n").trim().to_string();
    }

    let mut entries: Vec<Entry> = Vec::new();
    for line in lines.iter().filter(|l| !l.trim().is_empty()) {
        let trimmed = line.trim();
        if indent_of(line) == margin {
            match ENTRY_RE.captures(trimmed) {
                Some(caps) => entries.push(Entry {
                    name: caps["name"].to_string(),
                    ty: caps.name("type").map(|m| m.as_str().trim().to_string()),
                    desc: caps["desc"].trim().to_string(),
                }),
                None => entries.push(Entry {
                    name: trimmed.to_string(),
                    ty: None,
                    desc: String::new(),
                }),
            }
        } else if let Some(entry) = entries.last_mut() {
            append_desc(&mut entry.desc, trimmed);
        }
    }
    entries_markdown(&entries)
}

pub fn google_to_markdown(doc: &str) -> String {
    let lines: Vec<&str> = doc.lines().collect();
    let mut out = String::new();
    let mut text: Vec<&str> = Vec::new();
    let mut i = 0;

    let flush_text = |out: &mut String, text: &mut Vec<&str>| {
        let chunk = text.join("\n");
        let chunk = chunk.trim();
        if !chunk.is_empty() {
            if !out.is_empty() {
                out.push_str("\n\n");
            }
            out.push_str(chunk);
        }
        text.clear();
    };

    while i < lines.len() {
        let Some(caps) = GOOGLE_SECTION_RE.captures(lines[i]) else {
            text.push(lines[i]);
            i += 1;
            continue;
        };
        flush_text(&mut out, &mut text);
        let title = section_title(caps.name("title").map(|m| m.as_str()).unwrap_or(""));
        i += 1;
        let start = i;
        while i < lines.len() && (lines[i].trim().is_empty() || lines[i].starts_with(char::is_whitespace)) {
            i += 1;
        }
        push_section(&mut out, title, &section_body(title, &lines[start..i]));
    }
    flush_text(&mut out, &mut text);
    out
}

pub fn pydocmd_to_markdown(doc: &str) -> String {
    let mut out = String::new();
    let mut text: Vec<&str> = Vec::new();
    let mut section: Option<(String, Vec<&str>)> = None;

    let finish = |out: &mut String, section: Option<(String, Vec<&str>)>| {
        if let Some((title, lines)) = section {
            let body = if is_entry_section(&title) {
                let entries: Vec<Entry> = lines
                    .iter()
                    .filter(|l| !l.trim().is_empty())
                    .map(|l| match ENTRY_RE.captures(l.trim()) {
                        Some(caps) => Entry {
                            name: caps["name"].to_string(),
                            ty: caps.name("type").map(|m| m.as_str().trim().to_string()),
                            desc: caps["desc"].trim().to_string(),
                        },
                        None => Entry {
                            name: l.trim().to_string(),
                            ty: None,
                            desc: String::new(),
                        },
                    })
                    .collect();
                entries_markdown(&entries)
            } else {
                lines.join("\n").trim().to_string()
            };
            push_section(out, &title, &body);
        }
    };

    for line in doc.lines() {
        if let Some(caps) = PYDOCMD_SECTION_RE.captures(line) {
            if section.is_none() {
                let chunk = text.join("\n");
                if !chunk.trim().is_empty() {
                    out.push_str(chunk.trim());
                }
                text.clear();
            }
            finish(&mut out, section.take());
            section = Some((section_title(&caps["title"]).to_string(), Vec::new()));
            continue;
        }
        match section.as_mut() {
            Some((_, lines)) => lines.push(line),
            None => text.push(line),
        }
    }

    if section.is_none() {
        return text.join("\n").trim().to_string();
    }
    finish(&mut out, section);
    out
}
