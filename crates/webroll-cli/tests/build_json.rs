//! Integration tests for `webroll build --json` output.

use serial_test::serial;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::tempdir;

fn cargo_bin() -> Command {
    let mut cmd = Command::new(env!("CARGO"));
    cmd.args(["run", "-p", "webroll-cli", "--bin", "webroll", "--"]);
    cmd
}

fn build_json(dir: &Path, extra: &[&str]) -> (Output, serde_json::Value) {
    let output = cargo_bin()
        .args(["build", "--json", "--cwd"])
        .arg(dir)
        .args(extra)
        .output()
        .expect("Failed to run build command");

    let stdout = String::from_utf8_lossy(&output.stdout);
    let json: serde_json::Value =
        serde_json::from_str(stdout.trim()).expect("stdout should be valid JSON");
    (output, json)
}

fn write(dir: &Path, rel: &str, contents: &str) {
    let path = dir.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, contents).unwrap();
}

#[test]
#[serial]
fn test_first_build_bootstraps_config_and_bundles() {
    let dir = tempdir().unwrap();
    write(
        dir.path(),
        "src/index.ts",
        "import { greet } from './greet';\nconsole.log(greet());\n",
    );
    write(
        dir.path(),
        "src/greet.ts",
        "export function greet() { return 'hi'; }\n",
    );

    let (output, json) = build_json(dir.path(), &[]);
    assert!(output.status.success(), "build should succeed: {json}");
    assert_eq!(json["ok"], true);
    assert_eq!(json["outputs"], serde_json::json!(["/dist/index.js"]));
    assert!(json["duration_ms"].is_u64());
    assert!(json.get("error").is_none());

    let config = std::fs::read_to_string(dir.path().join("webroll.config.json")).unwrap();
    let config: serde_json::Value = serde_json::from_str(&config).unwrap();
    assert_eq!(config["entryPoints"], serde_json::json!(["src/index.ts"]));
    assert_eq!(config["format"], "esm");

    let bundle = std::fs::read_to_string(dir.path().join("dist/index.js")).unwrap();
    assert!(bundle.contains("export function greet()"));
    assert!(bundle.contains("console.log(greet());"));
    assert!(!bundle.contains("from './greet'"));
}

#[test]
#[serial]
fn test_flags_seed_config_and_aliases_resolve() {
    let dir = tempdir().unwrap();
    write(
        dir.path(),
        "app/main.js",
        "import { v } from '@lib/value';\nconsole.log(v);\n",
    );
    write(dir.path(), "lib/value.js", "export const v = 42;\n");

    let (output, json) = build_json(
        dir.path(),
        &[
            "--entry",
            "app/main.js",
            "--format",
            "iife",
            "--outdir",
            "public",
            "--alias",
            "@lib=/lib",
        ],
    );
    assert!(output.status.success(), "build should succeed: {json}");
    assert_eq!(json["outputs"], serde_json::json!(["/public/main.js"]));

    let bundle = std::fs::read_to_string(dir.path().join("public/main.js")).unwrap();
    assert!(bundle.starts_with("(() => {"));
    assert!(bundle.contains("export const v = 42;"));
}

#[test]
#[serial]
fn test_unresolved_entry_reports_error_code() {
    let dir = tempdir().unwrap();
    write(
        dir.path(),
        "webroll.config.json",
        r#"{"entryPoints":["src/missing.ts"]}"#,
    );

    let (output, json) = build_json(dir.path(), &[]);
    assert!(!output.status.success());
    assert_eq!(json["ok"], false);
    assert_eq!(json["error"]["code"], "UNRESOLVED_ENTRY");
    assert!(json["error"]["message"]
        .as_str()
        .unwrap()
        .contains("src/missing.ts"));
    assert!(!dir.path().join("dist").exists());
}

#[test]
#[serial]
fn test_malformed_config_is_not_replaced() {
    let dir = tempdir().unwrap();
    write(dir.path(), "webroll.config.json", "{ not json");

    let (output, json) = build_json(dir.path(), &[]);
    assert!(!output.status.success());
    assert_eq!(json["error"]["code"], "CONFIG_PARSE_ERROR");

    let config = std::fs::read_to_string(dir.path().join("webroll.config.json")).unwrap();
    assert_eq!(config, "{ not json");
}
