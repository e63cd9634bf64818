use docpipe_core::graph::ObjectKind;
use docpipe_core::scan::{clean_docstring, logical_lines, parse_module, string_literal};

#[test]
fn test_logical_lines_join_continuations() {
    let source = "x = (1,\n     2)\ny = 3 + \\\n    4\n# comment only\nz = '#not a comment'  # trailing\n";
    let lines = logical_lines(source);

    let texts: Vec<&str> = lines.iter().map(|l| l.text.as_str()).collect();
    assert_eq!(
        texts,
        vec!["x = (1,      2)", "y = 3 +      4", "z = '#not a comment'"]
    );
    let starts: Vec<usize> = lines.iter().map(|l| l.lineno).collect();
    assert_eq!(starts, vec![1, 3, 6]);
}

#[test]
fn test_logical_lines_keep_triple_quoted_strings_whole() {
    let source = "def f():\n    \"\"\"First.\n\n    # not a comment\n    \"\"\"\n    return 1\n";
    let lines = logical_lines(source);

    assert_eq!(lines.len(), 3);
    assert_eq!(lines[1].indent, 4);
    assert_eq!(lines[1].text, "\"\"\"First.\n\n    # not a comment\n    \"\"\"");
    assert_eq!(lines[2].lineno, 6);
}

#[test]
fn test_tabs_indent_to_multiples_of_eight() {
    let lines = logical_lines("class A:\n\tx = 1\n");
    assert_eq!(lines[1].indent, 8);
}

#[test]
fn test_string_literal_only_accepts_a_single_literal() {
    assert_eq!(string_literal("\"\"\"Doc.\"\"\"").as_deref(), Some("Doc."));
    assert_eq!(string_literal("r'raw \\d'").as_deref(), Some("raw \\d"));
    assert_eq!(string_literal("\"a\" + \"b\""), None);
    assert_eq!(string_literal("x = \"a\""), None);
}

#[test]
fn test_clean_docstring_strips_common_indent() {
    let raw = "Summary.\n\n        Details here.\n          Indented more.\n    ";
    assert_eq!(
        clean_docstring(raw),
        "Summary.\n\nDetails here.\n  Indented more."
    );
    assert_eq!(clean_docstring("\n   Only body.\n"), "Only body.");
}

#[test]
fn test_parse_module_structure() {
    let source = r#"#!/usr/bin/env python
"""Module docstring."""

import os

MAX_SIZE: int = 10
"""Upper bound."""

if os.name == "nt":
    WINDOWS = True

@dataclass(frozen=True)
class Point(Base, metaclass=Meta):
    """A point."""

    x: float = 0.0

    @property
    def norm(self) -> float:
        """Length."""
        return (self.x ** 2) ** 0.5

    class Inner:
        pass

async def fetch(
    url: str,
    *,
    timeout: float = 1.0,
) -> bytes:
    ...

def _private(): pass
"#;
    let module = parse_module("geo", source);

    assert_eq!(module.name, "geo");
    assert_eq!(module.docstring.as_deref(), Some("Module docstring."));

    let names: Vec<&str> = module.members.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(names, vec!["MAX_SIZE", "Point", "fetch", "_private"]);

    let max = &module.members[0];
    assert_eq!(max.kind, ObjectKind::Data);
    assert_eq!(max.signature.as_deref(), Some(": int = 10"));
    assert_eq!(max.docstring.as_deref(), Some("Upper bound."));

    let point = &module.members[1];
    assert_eq!(point.kind, ObjectKind::Class);
    assert_eq!(point.decorators, vec!["dataclass(frozen=True)"]);
    assert_eq!(point.bases, vec!["Base", "metaclass=Meta"]);
    assert_eq!(point.docstring.as_deref(), Some("A point."));
    let members: Vec<(&str, ObjectKind)> = point
        .members
        .iter()
        .map(|m| (m.name.as_str(), m.kind))
        .collect();
    assert_eq!(
        members,
        vec![
            ("x", ObjectKind::Data),
            ("norm", ObjectKind::Method),
            ("Inner", ObjectKind::Class)
        ]
    );
    let norm = &point.members[1];
    assert_eq!(norm.decorators, vec!["property"]);
    assert_eq!(norm.signature.as_deref(), Some("(self) -> float"));
    assert_eq!(norm.docstring.as_deref(), Some("Length."));

    let fetch = &module.members[2];
    assert_eq!(fetch.kind, ObjectKind::Function);
    assert_eq!(
        fetch.signature.as_deref(),
        Some("(url: str, *, timeout: float = 1.0) -> bytes")
    );
    assert_eq!(fetch.docstring, None);
}

#[test]
fn test_module_without_docstring() {
    let module = parse_module("plain", "x = 1\n\"\"\"Doc for x.\"\"\"\n");
    assert_eq!(module.docstring, None);
    assert_eq!(module.members[0].docstring.as_deref(), Some("Doc for x."));
}

#[test]
fn test_comparison_is_not_an_assignment() {
    let module = parse_module("cmp", "a == b\nc += 1\nd = 2\n");
    let names: Vec<&str> = module.members.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(names, vec!["d"]);
}

#[test]
fn test_keyword_one_liners_are_not_assignments() {
    let source = "if TYPE_CHECKING: x = 1\nelse: y = 2\ntry: import foo\nexcept ImportError: foo = None\nfinally: z = 3\nwhile False: w = 4\nwith ctx: v = 5\nreal = 6\n";
    let module = parse_module("m", source);

    let members: Vec<(&str, Option<&str>)> = module
        .members
        .iter()
        .map(|m| (m.name.as_str(), m.signature.as_deref()))
        .collect();
    assert_eq!(members, vec![("real", Some("= 6"))]);
}

#[test]
fn test_escaped_quotes_stay_inside_the_docstring() {
    let module = parse_module("m", "def f():\n    \"Say \\\"hi\\\".\"\n    pass\n");
    assert_eq!(module.members[0].docstring.as_deref(), Some("Say \"hi\"."));

    assert_eq!(string_literal(r"'it\'s'").as_deref(), Some("it's"));
    assert_eq!(string_literal(r"'a\\' + 'b'"), None);
    assert_eq!(string_literal(r"r'\d\''").as_deref(), Some(r"\d\'"));
}

#[test]
fn test_byte_order_mark_is_ignored() {
    let module = parse_module("bom", "\u{feff}\"\"\"Module with a BOM.\"\"\"\nx = 1\n");
    assert_eq!(module.docstring.as_deref(), Some("Module with a BOM."));
    assert_eq!(logical_lines("\u{feff}x = 1\n")[0].indent, 0);
}

#[test]
fn test_escaped_quotes_do_not_split_signatures() {
    let module = parse_module("sig", "def f(a='x\\'):', b=\"(\") -> Literal['a\\'b:']: pass\n");
    assert_eq!(
        module.members[0].signature.as_deref(),
        Some("(a='x\\'):', b=\"(\") -> Literal['a\\'b:']")
    );
}
