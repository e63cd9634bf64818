use assert_cmd::Command;
use predicates::prelude::*;
use std::fs::{self, write};
use std::path::{Path, PathBuf};
use tempfile::{tempdir, NamedTempFile, TempDir};

const MODULE: &str = r#""""Tools for greeting."""


def greet(name: str) -> str:
    """Return a greeting.

    Args:
        name: who to greet
    """
    return f"Hello {name}"


def _hidden():
    """Not rendered."""
"#;

/// A search directory holding a single `greetings.py`.
fn python_sources() -> (TempDir, PathBuf) {
    let tmp = tempdir().expect("temp dir");
    let src = tmp.path().join("src");
    fs::create_dir_all(&src).unwrap();
    write(src.join("greetings.py"), MODULE).unwrap();
    (tmp, src)
}

fn config_for(src: &Path, output: &Path) -> NamedTempFile {
    let config = NamedTempFile::new().expect("Creating temp config file failed");
    let yaml = format!(
        "loaders:\n  - type: python\n    search_path: [\"{}\"]\n    modules: [greetings]\nprocessors:\n  - type: google\n  - type: filter\nrenderer:\n  type: markdown\n  filename: \"{}\"\n",
        src.display(),
        output.display()
    );
    write(config.path(), yaml).expect("Writing temp config failed");
    config
}

#[test]
fn render_cli_writes_markdown_from_config_file() {
    let (tmp, src) = python_sources();
    let output = tmp.path().join("docs").join("api.md");
    let config = config_for(&src, &output);

    let mut cmd = Command::cargo_bin("docpipe").expect("Binary exists");
    cmd.arg("render").arg("--config").arg(config.path());
    cmd.assert().success();

    let rendered = fs::read_to_string(&output).expect("markdown written");
    assert!(rendered.contains("# greetings"));
    assert!(rendered.contains("Tools for greeting."));
    assert!(rendered.contains("def greet(name: str) -> str"));
    assert!(rendered.contains("**Arguments**:\n\n- `name`: who to greet"));
    assert!(!rendered.contains("\\_hidden"), "private functions are filtered");
}

#[test]
fn render_cli_source_flags_and_output_override() {
    let (tmp, src) = python_sources();
    let output = tmp.path().join("out.md");

    let mut cmd = Command::cargo_bin("docpipe").expect("Binary exists");
    cmd.arg("render")
        .arg("-I")
        .arg(&src)
        .arg("-m")
        .arg("greetings")
        .arg("--output")
        .arg(&output);
    cmd.assert().success().stdout(predicate::str::is_empty());

    let rendered = fs::read_to_string(&output).expect("markdown written");
    assert!(rendered.starts_with("<a name=\"greetings\"></a>\n# greetings"));
}

#[test]
fn render_cli_prints_to_stdout_without_filename() {
    let (_tmp, src) = python_sources();

    let mut cmd = Command::cargo_bin("docpipe").expect("Binary exists");
    cmd.arg("render").arg("-I").arg(&src).arg("-m").arg("greetings");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("#### greet").and(predicate::str::contains("Return a greeting.")));
}

#[test]
fn dump_cli_prints_module_graph_json() {
    let (_tmp, src) = python_sources();

    let mut cmd = Command::cargo_bin("docpipe").expect("Binary exists");
    cmd.arg("dump").arg("--search-path").arg(&src);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("\"name\": \"greetings\"").and(predicate::str::contains("\"kind\": \"function\"")));
}

#[test]
fn render_cli_fails_for_missing_config() {
    let mut cmd = Command::cargo_bin("docpipe").expect("Binary exists");
    cmd.arg("render").arg("--config").arg("/definitely/not/here/docpipe.yml");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load configuration"));
}

#[test]
fn render_cli_fails_for_unknown_plugin_type() {
    let config = NamedTempFile::new().unwrap();
    write(config.path(), "renderer:\n  type: html\n").unwrap();

    let mut cmd = Command::cargo_bin("docpipe").expect("Binary exists");
    cmd.arg("render").arg("--config").arg(config.path());
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Invalid pipeline configuration"));
}

#[test]
fn render_cli_fails_for_missing_module() {
    let (_tmp, src) = python_sources();

    let mut cmd = Command::cargo_bin("docpipe").expect("Binary exists");
    cmd.arg("render").arg("-I").arg(&src).arg("-m").arg("nowhere");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("nowhere"));
}

use std::sync::{Arc, Mutex};
use tracing_subscriber::prelude::*; // needed for .with()
use tracing_subscriber::{layer::Context, Layer, Registry};

/// Custom Layer to collect emitted event messages.
struct EventCollector {
    events: Arc<Mutex<Vec<String>>>,
}

impl<S> Layer<S> for EventCollector
where
    S: tracing::Subscriber,
{
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        use std::fmt::Write as FmtWrite;
        let mut msg = String::new();
        let _ = write!(&mut msg, "{:?}", event);
        self.events.lock().unwrap().push(msg);
    }
}

#[test]
fn emits_trace_initialised_event() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let collector = EventCollector {
        events: events.clone(),
    };
    let subscriber = Registry::default().with(collector);
    let _guard = tracing::subscriber::set_default(subscriber);

    use docpipe::cli::{run, Cli, Commands, SourceArgs};

    // A config path that does not exist: run fails, but only after tracing starts.
    let cli = Cli {
        command: Commands::Dump {
            source: SourceArgs {
                config: Some(PathBuf::from("dummy.yaml")),
                ..SourceArgs::default()
            },
        },
    };

    let _ = run(cli);

    let event_msgs = events.lock().unwrap();
    assert!(
        event_msgs.iter().any(|msg| msg.contains("trace_initialised")),
        "Expected a 'trace_initialised' trace event, got: {:?}",
        event_msgs
    );
}
