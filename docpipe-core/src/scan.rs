//! Static scanner for Python source files.
//!
//! Nothing is imported or executed. The source is split into logical lines
//! (bracket and backslash continuations joined, comments dropped, triple-quoted
//! strings kept whole), then walked by indentation to pick out the module
//! docstring, classes, functions/methods and simple assignments.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::graph::{Module, Object, ObjectKind};

static DEF_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:async\s+)?def\s+(?P<name>[A-Za-z_]\w*)\s*").unwrap());

static CLASS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^class\s+(?P<name>[A-Za-z_]\w*)\s*(?:\((?P<bases>.*)\))?\s*:").unwrap()
});

static ASSIGN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<name>[A-Za-z_]\w*)\s*(?P<ann>:\s*[^=]+?)?\s*=\s*(?P<value>[^=].*)$").unwrap()
});

static STRING_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"^(?P<prefix>[rRbBuUfF]{0,2})(?P<quote>"""|'''|"|')"#).unwrap());

/// Names that open a statement and so never start an assignment, even when
/// followed by `:` as in `else: y = 2`.
const KEYWORDS: &[&str] = &[
    "False", "None", "True", "and", "as", "assert", "async", "await", "break", "case", "class",
    "continue", "def", "del", "elif", "else", "except", "finally", "for", "from", "global", "if",
    "import", "in", "is", "lambda", "match", "nonlocal", "not", "or", "pass", "raise", "return",
    "try", "while", "with", "yield",
];

static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// One statement, possibly spanning several physical lines.
#[derive(Debug, Clone, PartialEq)]
pub struct LogicalLine {
    pub indent: usize,
    /// 1-based physical line the statement starts on.
    pub lineno: usize,
    pub text: String,
}

/// Scans `source` into a [`Module`] named `name`.
pub fn parse_module(name: &str, source: &str) -> Module {
    let lines = logical_lines(source);
    let mut module = Module::new(name);
    let mut idx = 0;

    if let Some(first) = lines.first() {
        if first.indent == 0 {
            if let Some(doc) = string_literal(&first.text) {
                module.docstring = Some(clean_docstring(&doc));
                idx = 1;
            }
        }
    }

    module.members = parse_block(&lines, &mut idx, 0, false);
    module
}

fn parse_block(lines: &[LogicalLine], idx: &mut usize, indent: usize, in_class: bool) -> Vec<Object> {
    let mut members = Vec::new();
    let mut decorators: Vec<String> = Vec::new();

    while *idx < lines.len() {
        let line = &lines[*idx];
        if line.indent < indent {
            break;
        }
        if line.indent > indent {
            // body of a statement we do not descend into (if/try/with/...)
            *idx += 1;
            continue;
        }

        if let Some(decorator) = line.text.strip_prefix('@') {
            decorators.push(decorator.trim().to_string());
            *idx += 1;
            continue;
        }

        if let Some(caps) = DEF_RE.captures(&line.text) {
            let kind = if in_class {
                ObjectKind::Method
            } else {
                ObjectKind::Function
            };
            let mut object = Object::new(&caps["name"], kind);
            let header_end = caps.get(0).map(|m| m.end()).unwrap_or(0);
            object.signature = def_signature(&line.text[header_end..]);
            object.decorators = std::mem::take(&mut decorators);
            *idx += 1;
            object.docstring = body_docstring(lines, idx, indent);
            skip_body(lines, idx, indent);
            members.push(object);
            continue;
        }

        if let Some(caps) = CLASS_RE.captures(&line.text) {
            let mut object = Object::new(&caps["name"], ObjectKind::Class);
            if let Some(bases) = caps.name("bases") {
                object.bases = split_top_level(bases.as_str(), ',')
                    .into_iter()
                    .map(|b| normalize_whitespace(&b))
                    .filter(|b| !b.is_empty())
                    .collect();
            }
            object.decorators = std::mem::take(&mut decorators);
            *idx += 1;
            object.docstring = body_docstring(lines, idx, indent);
            if let Some(next) = lines.get(*idx) {
                if next.indent > indent {
                    object.members = parse_block(lines, idx, next.indent, true);
                }
            }
            members.push(object);
            continue;
        }

        decorators.clear();

        if let Some(caps) = ASSIGN_RE
            .captures(&line.text)
            .filter(|caps| !KEYWORDS.contains(&&caps["name"]))
        {
            let mut object = Object::new(&caps["name"], ObjectKind::Data);
            let value = caps["value"].trim();
            object.signature = Some(match caps.name("ann") {
                Some(ann) => format!("{} = {}", normalize_whitespace(ann.as_str()), value),
                None => format!("= {value}"),
            });
            *idx += 1;
            if let Some(next) = lines.get(*idx) {
                if next.indent == indent {
                    if let Some(doc) = string_literal(&next.text) {
                        object.docstring = Some(clean_docstring(&doc));
                        *idx += 1;
                    }
                }
            }
            members.push(object);
            continue;
        }

        *idx += 1;
    }

    members
}

fn body_docstring(lines: &[LogicalLine], idx: &mut usize, header_indent: usize) -> Option<String> {
    let line = lines.get(*idx)?;
    if line.indent <= header_indent {
        return None;
    }
    let doc = string_literal(&line.text)?;
    *idx += 1;
    Some(clean_docstring(&doc))
}

fn skip_body(lines: &[LogicalLine], idx: &mut usize, header_indent: usize) {
    while *idx < lines.len() && lines[*idx].indent > header_indent {
        *idx += 1;
    }
}

/// Extracts `(params) -> ret` from the text following `def name`.
fn def_signature(rest: &str) -> Option<String> {
    if !rest.starts_with('(') {
        return None;
    }
    let close = matching_close(rest)?;
    let params = &rest[..=close];
    let tail = &rest[close + 1..];
    let colon = find_top_level(tail, ':').unwrap_or(tail.len());
    let ret = tail[..colon].trim();

    let mut signature = normalize_params(params);
    if !ret.is_empty() {
        signature.push(' ');
        signature.push_str(&normalize_whitespace(ret));
    }
    Some(signature)
}

fn normalize_params(params: &str) -> String {
    let inner = &params[1..params.len() - 1];
    let parts: Vec<String> = split_top_level(inner, ',')
        .into_iter()
        .map(|p| normalize_whitespace(&p))
        .filter(|p| !p.is_empty())
        .collect();
    format!("({})", parts.join(", "))
}

fn normalize_whitespace(text: &str) -> String {
    WHITESPACE_RE.replace_all(text.trim(), " ").into_owned()
}

/// Yields `(byte index, char, bracket depth)` for every character outside
/// string literals. Depth is taken after the character itself is applied.
fn unquoted_chars(text: &str) -> impl Iterator<Item = (usize, char, usize)> + '_ {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    text.char_indices().filter_map(move |(i, c)| {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            return None;
        }
        match c {
            '\'' | '"' => {
                quote = Some(c);
                None
            }
            '(' | '[' | '{' => {
                depth += 1;
                Some((i, c, depth))
            }
            ')' | ']' | '}' => {
                depth = depth.saturating_sub(1);
                Some((i, c, depth))
            }
            _ => Some((i, c, depth)),
        }
    })
}

/// Byte index of the bracket closing the one at index 0.
fn matching_close(text: &str) -> Option<usize> {
    unquoted_chars(text)
        .find(|&(_, c, depth)| matches!(c, ')' | ']' | '}') && depth == 0)
        .map(|(i, _, _)| i)
}

fn find_top_level(text: &str, needle: char) -> Option<usize> {
    unquoted_chars(text)
        .find(|&(_, c, depth)| c == needle && depth == 0)
        .map(|(i, _, _)| i)
}

fn split_top_level(text: &str, separator: char) -> Vec<String> {
    let mut parts = Vec::new();
    let mut rest = text;
    while let Some(pos) = find_top_level(rest, separator) {
        parts.push(rest[..pos].to_string());
        rest = &rest[pos + separator.len_utf8()..];
    }
    parts.push(rest.to_string());
    parts
}

/// Returns the value of `text` if the whole statement is one string literal.
pub fn string_literal(text: &str) -> Option<String> {
    let caps = STRING_RE.captures(text)?;
    let quote = caps.name("quote")?.as_str();
    let raw = caps.name("prefix")?.as_str().contains(['r', 'R']);
    let rest = &text[caps.get(0)?.end()..];

    // The first unescaped closing quote must end the statement; anything after
    // it means implicit concatenation or an expression built from literals.
    let mut chars = rest.char_indices();
    let close = loop {
        let (i, c) = chars.next()?;
        if c == '\\' {
            chars.next();
        } else if rest[i..].starts_with(quote) {
            break i;
        }
    };
    if close + quote.len() != rest.len() {
        return None;
    }
    let inner = &rest[..close];
    Some(if raw { inner.to_string() } else { unescape(inner) })
}

/// Resolves escaped quotes, escaped backslashes and line continuations.
/// Other escapes are kept verbatim.
fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some(next @ ('\\' | '\'' | '"')) => out.push(next),
            Some('\n') => {}
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

/// Strips the common indentation of a docstring the way `inspect.cleandoc` does.
pub fn clean_docstring(raw: &str) -> String {
    let expanded = raw.replace('\t', "        ");
    let lines: Vec<&str> = expanded.lines().collect();
    let Some(first) = lines.first() else {
        return String::new();
    };

    let leading = |l: &str| l.chars().take_while(|c| c.is_whitespace()).count();
    let margin = lines
        .iter()
        .skip(1)
        .filter(|l| !l.trim().is_empty())
        .map(|l| leading(l))
        .min()
        .unwrap_or(0);

    let mut out: Vec<String> = Vec::with_capacity(lines.len());
    out.push(first.trim().to_string());
    for line in lines.iter().skip(1) {
        if line.trim().is_empty() {
            out.push(String::new());
        } else {
            out.push(line.chars().skip(margin).collect::<String>().trim_end().to_string());
        }
    }

    while out.first().map(|l| l.is_empty()).unwrap_or(false) {
        out.remove(0);
    }
    while out.last().map(|l| l.is_empty()).unwrap_or(false) {
        out.pop();
    }
    out.join("\n")
}

fn flush(buf: &mut String, indent: usize, start_line: usize, lines: &mut Vec<LogicalLine>) {
    let text = buf.trim();
    if !text.is_empty() {
        lines.push(LogicalLine {
            indent,
            lineno: start_line,
            text: text.to_string(),
        });
    }
    buf.clear();
}

/// Splits Python source into logical lines.
pub fn logical_lines(source: &str) -> Vec<LogicalLine> {
    let source = source.strip_prefix('\u{feff}').unwrap_or(source);
    let mut lines = Vec::new();
    let mut buf = String::new();
    let mut indent = 0usize;
    let mut start_line = 1usize;
    let mut lineno = 1usize;
    let mut col = 0usize;
    let mut depth = 0usize;
    let mut at_line_start = true;
    let mut quote: Option<(char, bool)> = None;
    let mut chars = source.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '\r' {
            continue;
        }

        if let Some((q, triple)) = quote {
            if c == '\n' && !triple {
                // unterminated single-quoted string; close it at end of line
                quote = None;
            } else {
                buf.push(c);
                if c == '\n' {
                    lineno += 1;
                } else if c == '\\' {
                    if let Some(next) = chars.next() {
                        if next == '\n' {
                            lineno += 1;
                        }
                        buf.push(next);
                    }
                } else if c == q {
                    if !triple {
                        quote = None;
                    } else {
                        let mut ahead = chars.clone();
                        if ahead.next() == Some(q) && ahead.next() == Some(q) {
                            chars.next();
                            chars.next();
                            buf.push(q);
                            buf.push(q);
                            quote = None;
                        }
                    }
                }
                continue;
            }
        }

        if at_line_start {
            match c {
                ' ' => {
                    col += 1;
                    continue;
                }
                '\t' => {
                    col += 8 - col % 8;
                    continue;
                }
                '\x0c' => continue,
                '\n' => {
                    lineno += 1;
                    col = 0;
                    continue;
                }
                _ => {
                    at_line_start = false;
                    indent = col;
                    start_line = lineno;
                }
            }
        }

        match c {
            '#' => {
                while let Some(&next) = chars.peek() {
                    if next == '\n' {
                        break;
                    }
                    chars.next();
                }
            }
            '\'' | '"' => {
                let mut ahead = chars.clone();
                let triple = ahead.next() == Some(c) && ahead.next() == Some(c);
                buf.push(c);
                if triple {
                    chars.next();
                    chars.next();
                    buf.push(c);
                    buf.push(c);
                }
                quote = Some((c, triple));
            }
            '(' | '[' | '{' => {
                depth += 1;
                buf.push(c);
            }
            ')' | ']' | '}' => {
                depth = depth.saturating_sub(1);
                buf.push(c);
            }
            '\\' if chars.peek() == Some(&'\n') => {
                chars.next();
                lineno += 1;
                buf.push(' ');
            }
            '\n' => {
                lineno += 1;
                if depth > 0 {
                    buf.push(' ');
                    continue;
                }
                flush(&mut buf, indent, start_line, &mut lines);
                at_line_start = true;
                col = 0;
            }
            _ => buf.push(c),
        }
    }
    flush(&mut buf, indent, start_line, &mut lines);

    lines
}
