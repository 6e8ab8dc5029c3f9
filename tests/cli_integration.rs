use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use serde_json::Value;
use tempfile::TempDir;

struct Fixture {
    _tmp: TempDir,
    root: PathBuf,
    entry: PathBuf,
}

impl Fixture {
    fn new() -> Self {
        let tmp = tempfile::tempdir().expect("create tempdir");
        let root = tmp.path().to_path_buf();

        let mut md = String::from("# Handbook\n\n## Setup\n\n");
        for n in 0..8 {
            md.push_str(&format!(
                "Setup step {n}. {}\n\n",
                "Install the toolchain and check the version. ".repeat(6)
            ));
        }
        md.push_str("```sh\ncargo install pagewire\n```\n\n## Usage\n\n- render\n- simulate\n\n");
        for n in 0..8 {
            md.push_str(&format!("Usage note {n}. {}\n\n", "Read the docs. ".repeat(20)));
        }
        md.push_str(
            "See [crates.io](https://crates.io/crates/pagewire).\n\n<script>alert(1)</script>\n",
        );

        let entry = root.join("handbook.md");
        fs::write(&entry, md).expect("write handbook");
        fs::write(root.join("notes.txt"), "not markdown\n").expect("write notes");

        Self {
            _tmp: tmp,
            root,
            entry,
        }
    }

    fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.root.join(name);
        fs::write(&path, contents).unwrap_or_else(|e| panic!("write {name}: {e}"));
        path
    }
}

fn bin_path() -> String {
    std::env::var("CARGO_BIN_EXE_pagewire").expect("CARGO_BIN_EXE_pagewire is set by cargo test")
}

fn run(args: &[&str]) -> Output {
    Command::new(bin_path())
        .args(args)
        .env_remove("PAGEWIRE_LOG")
        .output()
        .expect("spawn pagewire")
}

fn path_str(path: &Path) -> &str {
    path.to_str().expect("utf-8 temp path")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

fn assert_success(output: &Output) {
    assert!(
        output.status.success(),
        "exit={:?}\nstdout:\n{}\nstderr:\n{}",
        output.status.code(),
        stdout(output),
        stderr(output)
    );
}

fn snapshots(output: &Output) -> Vec<Value> {
    stdout(output)
        .lines()
        .map(|line| serde_json::from_str(line).unwrap_or_else(|e| panic!("bad line {line:?}: {e}")))
        .collect()
}

#[test]
fn test_render_to_stdout() {
    let fixture = Fixture::new();
    let output = run(&["render", path_str(&fixture.entry)]);
    assert_success(&output);
    let html = stdout(&output);
    assert!(html.starts_with("<!DOCTYPE html>"));
    assert!(html.contains("<title>Handbook</title>"));
    assert!(html.contains("href=\"#setup\"") && html.contains("href=\"#usage\""));
    assert!(html.contains("data-copy-target=\"code-block-1\""));
    assert!(html.contains("<ul class=\"stagger\">"));
    assert!(html.contains("id=\"pagewire-config\""));
    assert!(!html.contains("<script>alert(1)</script>"), "raw html leaked:\n{html}");
}

#[test]
fn test_render_writes_site_directory() {
    let fixture = Fixture::new();
    let out = fixture.root.join("site");
    let output = run(&["render", path_str(&fixture.entry), "--out", path_str(&out)]);
    assert_success(&output);
    assert!(stdout(&output).is_empty());

    let index = fs::read_to_string(out.join("index.html")).expect("index.html written");
    assert!(index.contains("href=\"assets/pagewire.css\""));
    let css = fs::read_to_string(out.join("assets/pagewire.css")).expect("stylesheet written");
    assert!(css.contains("[data-pagewire] .reveal.visible"));
    // Reveal targets stay visible until the behavior module marks the root.
    assert!(!index.contains("data-pagewire="), "marker is set at runtime only");
    assert!(!css.contains("\n.reveal {"));
}

#[test]
fn test_render_uses_config_ids() {
    let fixture = Fixture::new();
    let config = fixture.write(
        "site.json",
        r#"{"theme": {"toggle_id": "mode-switch"}, "toc": {"heading_levels": [2]}}"#,
    );
    let output = run(&["render", path_str(&fixture.entry), "--config", path_str(&config)]);
    assert_success(&output);
    let html = stdout(&output);
    assert!(html.contains("id=\"mode-switch\""));
    assert!(!html.contains("id=\"theme-toggle\""));
}

#[test]
fn test_invalid_config_is_rejected() {
    let fixture = Fixture::new();
    let config = fixture.write("bad.json", r#"{"toc": {"root_margin": "20vh"}}"#);
    let output = run(&["render", path_str(&fixture.entry), "--config", path_str(&config)]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("invalid toc observer options"), "{}", stderr(&output));

    let unknown = fixture.write("unknown.json", r#"{"sidebar": {}}"#);
    let output = run(&["render", path_str(&fixture.entry), "--config", path_str(&unknown)]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("failed to parse config"), "{}", stderr(&output));
}

#[test]
fn test_rejects_non_markdown_extension() {
    let fixture = Fixture::new();
    let output = run(&["render", path_str(&fixture.root.join("notes.txt"))]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("'txt' is not a recognized markdown extension"));
}

#[test]
fn test_missing_file_reports_not_found() {
    let fixture = Fixture::new();
    let output = run(&["render", path_str(&fixture.root.join("absent.md"))]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("file not found"), "{}", stderr(&output));
}

#[test]
fn test_simulate_prints_one_snapshot_per_step() {
    let fixture = Fixture::new();
    let script = fixture.write(
        "script.json",
        r#"{
            "viewport": {"width": 1280, "height": 600},
            "events": [
                {"scroll": 100000},
                {"click": "copy-code-block-1"},
                {"advance_ms": 2000},
                {"click": "theme-toggle"}
            ]
        }"#,
    );
    let output = run(&["simulate", path_str(&fixture.entry), "--script", path_str(&script)]);
    assert_success(&output);
    let snaps = snapshots(&output);
    assert_eq!(snaps.len(), 5);

    assert_eq!(snaps[0]["step"], 0);
    assert_eq!(snaps[0]["event"], Value::Null);
    assert_eq!(snaps[0]["theme"], "light");
    assert_eq!(snaps[1]["progress"], 100.0);
    assert_eq!(snaps[2]["buttons"][0], "Copied!");
    assert_eq!(snaps[2]["announcement"], "Copied to clipboard");
    assert_eq!(snaps[3]["buttons"][0], "Copy");
    assert_eq!(snaps[4]["theme"], "dark");
}

#[test]
fn test_simulate_unknown_element_fails() {
    let fixture = Fixture::new();
    let script = fixture.write("script.json", r#"{"events": [{"click": "nope"}]}"#);
    let output = run(&["simulate", path_str(&fixture.entry), "--script", path_str(&script)]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("no element matches"), "{}", stderr(&output));
}

#[test]
fn test_log_filter_from_env() {
    let fixture = Fixture::new();
    let output = Command::new(bin_path())
        .args(["render", path_str(&fixture.entry)])
        .env("PAGEWIRE_LOG", "debug")
        .output()
        .expect("spawn pagewire");
    assert_success(&output);
    assert!(stderr(&output).contains("markdown rendered"), "{}", stderr(&output));
    assert!(stdout(&output).starts_with("<!DOCTYPE html>"));

    let quiet = run(&["render", path_str(&fixture.entry)]);
    assert!(stderr(&quiet).is_empty(), "{}", stderr(&quiet));
}
