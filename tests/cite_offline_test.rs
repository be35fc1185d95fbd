use predicates::prelude::*;
use std::fs;
use tempfile::tempdir;

const ID: &str = "0190aaaa-bbbb-cccc-dddd-eeeeffff0000";

fn write_page(dir: &std::path::Path) -> std::path::PathBuf {
    let markup = format!(
        r#"<!DOCTYPE html>
<html>
<head>
  <title>Rust borrow checker walkthrough</title>
  <meta property="og:url" content="https://chatgpt.com/share/{ID}">
  <meta property="og:title" content="Ada Lovelace — Rust borrow checker walkthrough">
  <time datetime="2024-01-15T10:30:00Z">Jan 15, 2024</time>
</head>
<body>
  <div data-testid="conversation-turn" data-message-author-role="user" data-message-id="u1">hello</div>
</body>
</html>"#
    );
    let path = dir.join("page.html");
    fs::write(&path, markup).expect("write page markup");
    path
}

#[test]
fn offline_capture_resolves_from_markup() {
    let tmp = tempdir().expect("tempdir");
    let page = write_page(tmp.path());

    assert_cmd::cargo::cargo_bin_cmd!("chatcite")
        .current_dir(tmp.path())
        .arg("cite")
        .args(["--url", &format!("https://chatgpt.com/c/{ID}")])
        .args(["--page", page.to_str().unwrap()])
        .arg("--offline")
        .assert()
        .success()
        .stdout(predicate::str::contains("Rust borrow checker walkthrough"))
        // Public share link found in the DOM becomes the record URL.
        .stdout(predicate::str::contains(format!(
            "https://chatgpt.com/share/{ID}"
        )))
        // The private page URL is preserved in extra.
        .stdout(predicate::str::contains(format!(
            "Private URL: https://chatgpt.com/c/{ID}"
        )))
        .stdout(predicate::str::contains("Ada Lovelace"))
        .stdout(predicate::str::contains("2024-01-15"))
        .stdout(predicate::str::contains("instantMessage"));
}

#[test]
fn offline_capture_without_markup_degrades_to_defaults() {
    let tmp = tempdir().expect("tempdir");

    assert_cmd::cargo::cargo_bin_cmd!("chatcite")
        .current_dir(tmp.path())
        .arg("cite")
        .args(["--url", &format!("https://chatgpt.com/c/{ID}")])
        .arg("--offline")
        .assert()
        .success()
        .stdout(predicate::str::contains("ChatGPT Conversation"))
        .stdout(predicate::str::contains("\"User\""))
        .stdout(predicate::str::contains(format!(
            "https://chatgpt.com/c/{ID}"
        )));
}

#[test]
fn record_can_be_written_to_a_file() {
    let tmp = tempdir().expect("tempdir");
    let page = write_page(tmp.path());
    let out = tmp.path().join("record.json");

    assert_cmd::cargo::cargo_bin_cmd!("chatcite")
        .current_dir(tmp.path())
        .arg("cite")
        .args(["--url", &format!("https://chatgpt.com/c/{ID}")])
        .args(["--page", page.to_str().unwrap()])
        .args(["--out", out.to_str().unwrap()])
        .arg("--offline")
        .arg("--pretty")
        .assert()
        .success();

    let written = fs::read_to_string(&out).expect("record written");
    let parsed: serde_json::Value = serde_json::from_str(&written).expect("valid record json");
    assert_eq!(parsed["itemType"], "instantMessage");
    assert_eq!(parsed["creators"][0]["name"], "ChatGPT");
    assert_eq!(parsed["attachments"][0]["snapshot"], true);
}
