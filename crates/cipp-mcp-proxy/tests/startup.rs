use std::path::{Path, PathBuf};
use std::time::Duration;

use assert_cmd::Command;
use predicates::str::contains;
use tempfile::TempDir;

#[test]
fn exits_unavailable_when_nothing_listens_upstream() -> Result<(), Box<dyn std::error::Error>> {
    let temp = TempDir::new()?;
    let (config, url) = dead_upstream_config(temp.path())?;

    let mut cmd = proxy();
    cmd.arg("--config").arg(&config).write_stdin("");

    cmd.assert()
        .failure()
        .code(69)
        .stderr(contains("failed to connect to `default`"))
        .stderr(contains(url.as_str()));
    Ok(())
}

#[test]
fn diagnostics_are_the_first_two_stderr_lines() -> Result<(), Box<dyn std::error::Error>> {
    let temp = TempDir::new()?;
    let (config, _) = dead_upstream_config(temp.path())?;

    let mut cmd = proxy();
    cmd.arg("--config").arg(&config).write_stdin("");
    let output = cmd.output()?;

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    let lines: Vec<&str> = stderr.lines().collect();
    assert!(lines.len() > 2, "stderr: {stderr}");
    assert!(lines[0].starts_with("PROXY EXECUTABLE: "), "stderr: {stderr}");
    assert!(lines[0].contains("cipp-mcp-proxy"), "stderr: {stderr}");
    assert!(lines[1].starts_with("PROXY VERSION: cipp-mcp-proxy "), "stderr: {stderr}");
    assert!(
        lines[2..].iter().all(|line| !line.starts_with("PROXY ")),
        "stderr: {stderr}"
    );
    Ok(())
}

#[test]
fn empty_config_fails_after_diagnostics() -> Result<(), Box<dyn std::error::Error>> {
    let temp = TempDir::new()?;
    let config = temp.path().join("proxy.json");
    std::fs::write(&config, r#"{"mcpServers": {}}"#)?;

    let mut cmd = proxy();
    cmd.arg("--config").arg(&config).write_stdin("");

    cmd.assert()
        .failure()
        .code(78)
        .stderr(contains("PROXY EXECUTABLE: "))
        .stderr(contains("PROXY VERSION: "))
        .stderr(contains("no MCP servers configured"));
    Ok(())
}

#[test]
fn unknown_transport_is_a_configuration_error() -> Result<(), Box<dyn std::error::Error>> {
    let temp = TempDir::new()?;
    let config = temp.path().join("proxy.json");
    std::fs::write(
        &config,
        r#"{"mcpServers": {"default": {"url": "http://localhost:3001/sse", "transport": "sse"}}}"#,
    )?;

    let mut cmd = proxy();
    cmd.arg("--config").arg(&config).write_stdin("");

    cmd.assert()
        .failure()
        .code(78)
        .stderr(contains("unknown variant `sse`"));
    Ok(())
}

#[test]
fn malformed_config_json_is_a_data_error() -> Result<(), Box<dyn std::error::Error>> {
    let temp = TempDir::new()?;
    let config = temp.path().join("proxy.json");
    std::fs::write(&config, "{ not json")?;

    let mut cmd = proxy();
    cmd.arg("--config").arg(&config).write_stdin("");

    cmd.assert()
        .failure()
        .code(65)
        .stderr(contains("serialization error"))
        .stderr(contains("proxy.json"));
    Ok(())
}

#[test]
fn rejects_unknown_arguments() {
    let mut cmd = proxy();
    cmd.arg("--listen").write_stdin("");

    cmd.assert().failure().code(64).stderr(contains("--listen"));
}

#[test]
fn help_lists_flags_and_exits_cleanly() {
    let mut cmd = proxy();
    cmd.arg("--help");

    cmd.assert()
        .success()
        .stdout(contains("--config"))
        .stdout(contains("--name"));
}

fn proxy() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_cipp-mcp-proxy"));
    cmd.env("RUST_LOG", "warn").timeout(Duration::from_secs(60));
    cmd
}

/// Writes a config pointing at a local port that was just released.
fn dead_upstream_config(dir: &Path) -> Result<(PathBuf, String), Box<dyn std::error::Error>> {
    let addr = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
        listener.local_addr()?
    };
    let url = format!("http://{addr}/mcp");
    let config = dir.join("proxy.json");
    std::fs::write(
        &config,
        format!(r#"{{"mcpServers": {{"default": {{"url": "{url}", "transport": "streamable-http"}}}}}}"#),
    )?;
    Ok((config, url))
}
