use docpipe_core::config::PluginSpec;
use docpipe_core::contract::{LoadError, Loader};
use docpipe_core::graph::{ModuleGraph, ObjectKind};
use docpipe_core::load::{PythonLoader, PythonLoaderOptions};
use docpipe_core::registry::PluginRegistry;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::{tempdir, TempDir};

const TOP: &str = r#""""Top module."""

VALUE = 1
"""The value."""


def helper(x):
    """Help."""
    return x
"#;

const CORE: &str = r#"class Engine(Base):
    """Runs things."""

    def start(self, fast: bool = False) -> None:
        """Start the engine."""
"#;

/// Lays out a small source tree:
///
/// ```text
/// src/top.py
/// src/pkg/__init__.py
/// src/pkg/core.py
/// src/pkg/sub/__init__.py
/// src/pkg/sub/leaf.py
/// src/pkg/__pycache__/stale.py
/// src/.hidden/__init__.py
/// src/notpkg/mod.py
/// ```
fn source_tree() -> (TempDir, PathBuf) {
    let tmp = tempdir().unwrap();
    let src = tmp.path().join("src");
    let files: &[(&str, &str)] = &[
        ("top.py", TOP),
        ("pkg/__init__.py", "\"\"\"Package doc.\"\"\"\n"),
        ("pkg/core.py", CORE),
        ("pkg/sub/__init__.py", ""),
        ("pkg/sub/leaf.py", "def leaf():\n    pass\n"),
        ("pkg/__pycache__/stale.py", "x = 1\n"),
        (".hidden/__init__.py", ""),
        ("notpkg/mod.py", "y = 2\n"),
    ];
    for (rel, content) in files {
        write_file(&src.join(rel), content);
    }
    (tmp, src)
}

fn write_file(path: &Path, content: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn loader(search_path: &Path, modules: &[&str], packages: &[&str]) -> PythonLoader {
    PythonLoader::new(PythonLoaderOptions {
        search_path: vec![search_path.to_path_buf()],
        modules: modules.iter().map(|s| s.to_string()).collect(),
        packages: packages.iter().map(|s| s.to_string()).collect(),
    })
}

fn load_names(loader: &PythonLoader) -> Vec<String> {
    let mut graph = ModuleGraph::new();
    loader.load(&mut graph).expect("load should succeed");
    graph.modules.into_iter().map(|m| m.name).collect()
}

struct TestCase {
    name: &'static str,
    modules: &'static [&'static str],
    packages: &'static [&'static str],
    expected: Vec<&'static str>,
}

#[test]
fn test_python_loader_resolution_table_driven() {
    let (_tmp, src) = source_tree();

    let test_cases = vec![
        TestCase {
            name: "discover everything below the search path",
            modules: &[],
            packages: &[],
            expected: vec!["pkg", "pkg.core", "pkg.sub", "pkg.sub.leaf", "top"],
        },
        TestCase {
            name: "single module",
            modules: &["top"],
            packages: &[],
            expected: vec!["top"],
        },
        TestCase {
            name: "dotted module inside a package",
            modules: &["pkg.core"],
            packages: &[],
            expected: vec!["pkg.core"],
        },
        TestCase {
            name: "package module resolves to its __init__",
            modules: &["pkg.sub"],
            packages: &[],
            expected: vec!["pkg.sub"],
        },
        TestCase {
            name: "sub-package with its submodules",
            modules: &[],
            packages: &["pkg.sub"],
            expected: vec!["pkg.sub", "pkg.sub.leaf"],
        },
        TestCase {
            name: "duplicates keep their first position",
            modules: &["pkg.core"],
            packages: &["pkg"],
            expected: vec!["pkg.core", "pkg", "pkg.sub", "pkg.sub.leaf"],
        },
    ];

    for case in test_cases {
        let names = load_names(&loader(&src, case.modules, case.packages));
        assert_eq!(names, case.expected, "[{}]", case.name);
    }
}

#[test]
fn test_loaded_modules_carry_path_and_members() {
    let (_tmp, src) = source_tree();
    let mut graph = ModuleGraph::new();
    loader(&src, &["top", "pkg.core"], &[]).load(&mut graph).unwrap();

    let top = graph.module("top").expect("top loaded");
    assert_eq!(top.path.as_deref(), Some(src.join("top.py").as_path()));
    assert_eq!(top.docstring.as_deref(), Some("Top module."));
    assert_eq!(top.members.len(), 2);
    assert_eq!(top.members[0].name, "VALUE");
    assert_eq!(top.members[0].kind, ObjectKind::Data);
    assert_eq!(top.members[0].docstring.as_deref(), Some("The value."));
    assert_eq!(top.members[1].name, "helper");
    assert_eq!(top.members[1].signature.as_deref(), Some("(x)"));

    let core = graph.module("pkg.core").expect("core loaded");
    let engine = &core.members[0];
    assert_eq!(engine.kind, ObjectKind::Class);
    assert_eq!(engine.bases, vec!["Base"]);
    assert_eq!(engine.members[0].kind, ObjectKind::Method);
    assert_eq!(
        engine.members[0].signature.as_deref(),
        Some("(self, fast: bool = False) -> None")
    );
}

#[test]
fn test_loader_appends_to_existing_graph() {
    let (_tmp, src) = source_tree();
    let mut graph = ModuleGraph::new();
    let loader = loader(&src, &["top"], &[]);

    loader.load(&mut graph).unwrap();
    loader.load(&mut graph).unwrap();

    let names: Vec<&str> = graph.modules.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(names, vec!["top", "top"]);
}

#[test]
fn test_unknown_module_is_reported_with_search_path() {
    let (_tmp, src) = source_tree();
    let mut graph = ModuleGraph::new();

    let err = loader(&src, &["top", "missing.module"], &[]).load(&mut graph).unwrap_err();

    match err {
        LoadError::ModuleNotFound { name, search_path } => {
            assert_eq!(name, "missing.module");
            assert_eq!(search_path, vec![src.clone()]);
        }
        other => panic!("expected ModuleNotFound, got {other:?}"),
    }
    assert!(graph.is_empty(), "resolution fails before anything is read");
}

#[test]
fn test_missing_search_directory_is_io_error() {
    let tmp = tempdir().unwrap();
    let missing = tmp.path().join("nope");
    let mut graph = ModuleGraph::new();

    let err = loader(&missing, &[], &[]).load(&mut graph).unwrap_err();
    assert!(matches!(err, LoadError::Io { ref path, .. } if *path == missing));
}

#[test]
fn test_python_loader_built_from_registry_spec() {
    let (_tmp, src) = source_tree();
    let registry = PluginRegistry::builtin();
    let spec = PluginSpec::new("python")
        .with_param("search_path", vec![src.to_string_lossy().into_owned()])
        .with_param("packages", vec!["pkg.sub"]);

    let loader = registry.build_loader(&spec).expect("python loader builds");
    let mut graph = ModuleGraph::new();
    loader.load(&mut graph).unwrap();

    assert_eq!(graph.modules.len(), 2);
    assert_eq!(graph.modules[1].members[0].name, "leaf");
}

#[test]
fn test_python_loader_rejects_unknown_options() {
    let spec = PluginSpec::new("python").with_param("recursive", true);
    assert!(PythonLoader::from_spec(&spec).is_err());
}
