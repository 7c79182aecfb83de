#![allow(missing_docs, clippy::expect_used, clippy::unwrap_used)]

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use std::time::Duration;
use tempfile::{TempDir, tempdir};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// A `docsynth` command isolated from the user's config, data dir and keys.
fn docsynth_cmd(home: &TempDir) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("docsynth"));
    cmd.timeout(Duration::from_secs(30));
    cmd.env("HOME", home.path());
    cmd.env("XDG_CONFIG_HOME", home.path().join("config"));
    cmd.env("XDG_DATA_HOME", home.path().join("data"));
    cmd.env("DOCSYNTH_DATA_DIR", home.path().join("docs"));
    cmd.env_remove("DOCSYNTH_LLM_API_KEY");
    cmd.env_remove("OPENAI_API_KEY");
    cmd.env_remove("DOCSYNTH_OUTPUT_FORMAT");
    cmd.env("NO_COLOR", "1");
    cmd
}

/// Config that points every provider at a local mock server.
fn local_config(home: &TempDir, provider_base: &str) -> std::path::PathBuf {
    let path = home.path().join("docsynth.toml");
    let endpoints = [
        "serper",
        "brave",
        "stackexchange",
        "github",
        "youtube",
        "reddit",
    ]
    .iter()
    .map(|name| format!("{name} = \"{provider_base}\""))
    .collect::<Vec<_>>()
    .join("\n");
    fs::write(
        &path,
        format!(
            "[http]\ntimeout_secs = 5\nprobe_timeout_secs = 2\n\n\
             [crawl]\nrequest_interval_ms = 0\n\n[research.endpoints]\n{endpoints}\n"
        ),
    )
    .unwrap();
    path
}

#[test]
fn help_lists_subcommands() {
    let home = tempdir().unwrap();
    docsynth_cmd(&home)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("generate"))
        .stdout(predicate::str::contains("estimate"))
        .stdout(predicate::str::contains("discover"))
        .stdout(predicate::str::contains("research"));
}

#[test]
fn estimate_rejects_loopback_with_usage_exit_code() {
    let home = tempdir().unwrap();
    docsynth_cmd(&home)
        .args(["estimate", "http://127.0.0.1/", "--format", "text"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Blocked URL"));
}

#[tokio::test]
async fn config_file_cannot_open_the_url_guard() {
    let server = MockServer::start().await;
    let home = tempdir().unwrap();
    let path = home.path().join("docsynth.toml");
    fs::write(&path, "[http]\nallow_private_hosts = true\n").unwrap();

    docsynth_cmd(&home)
        .args(["estimate", &server.uri(), "--format", "text", "--config"])
        .arg(&path)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Blocked URL"));
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[test]
fn discover_rejects_metadata_host() {
    let home = tempdir().unwrap();
    docsynth_cmd(&home)
        .args(["discover", "http://169.254.169.254/latest/meta-data"])
        .assert()
        .code(2);
}

#[test]
fn generate_without_api_key_fails_before_fetching() {
    let home = tempdir().unwrap();
    docsynth_cmd(&home)
        .args(["generate", "https://acme.example", "--dry-run"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("API key"));
}

#[test]
fn missing_config_file_is_a_usage_error() {
    let home = tempdir().unwrap();
    let absent = home.path().join("absent.toml");
    docsynth_cmd(&home)
        .args(["estimate", "https://acme.example", "--config"])
        .arg(&absent)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("absent.toml"));
}

#[tokio::test]
async fn estimate_json_against_mock_site() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/html")
                .set_body_string(
                    "<html><head><title>Acme</title></head><body>\
                     <a href=\"/docs\">Docs</a><a href=\"/blog\">Blog</a></body></html>",
                ),
        )
        .mount(&server)
        .await;

    let home = tempdir().unwrap();
    let config = local_config(&home, &server.uri());
    let output = docsynth_cmd(&home)
        .args(["estimate", &server.uri(), "--format", "json"])
        .args(["--allow-private-hosts", "--config"])
        .arg(&config)
        .output()
        .unwrap();

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let quote: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(quote["complexityFactors"]["pageSource"], "links");
    assert_eq!(quote["complexityFactors"]["pageEstimate"], 2);
    assert_eq!(quote["isFree"], true);
    assert_eq!(quote["estimatedTotal"], 0.0);
}

#[tokio::test]
async fn discover_json_lists_candidates() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/html")
                .set_body_string(
                    "<html><head><title>Acme | Home</title></head><body>\
                     <nav><a href=\"/docs/intro\">Intro</a></nav></body></html>",
                ),
        )
        .mount(&server)
        .await;

    let home = tempdir().unwrap();
    let config = local_config(&home, &server.uri());
    let output = docsynth_cmd(&home)
        .args(["discover", &server.uri(), "--format", "json"])
        .args(["--allow-private-hosts", "--config"])
        .arg(&config)
        .output()
        .unwrap();

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let report: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["site"]["productName"], "Acme");
    let candidates = report["candidates"].as_array().unwrap();
    assert!(
        candidates
            .iter()
            .any(|c| c.as_str().unwrap().ends_with("/docs/intro"))
    );
}
