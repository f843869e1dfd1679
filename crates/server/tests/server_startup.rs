//! Startup behavior of the binary: initialization failures must end the
//! process with a non-zero exit code.

use std::io::Write;
use std::time::Duration;

use tempfile::NamedTempFile;
use tokio::time::timeout;

async fn run_binary(config_path: Option<&std::path::Path>) -> std::process::ExitStatus {
    let mut command = tokio::process::Command::new(env!("CARGO_BIN_EXE_posterbot"));
    if let Some(path) = config_path {
        command.env("POSTERBOT_CONFIG", path);
    } else {
        command.env("POSTERBOT_CONFIG", "/nonexistent/posterbot.toml");
    }
    let mut child = command
        .env("RUST_LOG", "error")
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .expect("failed to spawn the server binary");

    timeout(Duration::from_secs(30), child.wait())
        .await
        .expect("server did not exit in time")
        .expect("failed to wait on the server")
}

#[tokio::test]
async fn missing_config_file_is_fatal() {
    let status = run_binary(None).await;
    assert!(!status.success());
}

#[tokio::test]
async fn incomplete_config_is_fatal() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "themoviedb_key = \"k\"").unwrap();
    let status = run_binary(Some(file.path())).await;
    assert!(!status.success());
}

#[tokio::test]
async fn startup_without_working_upstream_is_fatal() {
    // Valid config shape, but the TMDB key is bogus and the certificate
    // paths do not exist, so startup must fail before the listener binds.
    let mut file = NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
themoviedb_key = "test-key"
db_name = "{db}"

[bot_config]
telegram_token = "test-token"
webhook_address = "127.0.0.1"
webhook_port = 18443
telegram_bot_api_address = "http://127.0.0.1:9"
public_cert = "/nonexistent/cert.pem"
private_key = "/nonexistent/key.pem"
"#,
        db = std::env::temp_dir().join("posterbot-startup-test.db").display()
    )
    .unwrap();

    let status = run_binary(Some(file.path())).await;
    assert!(!status.success());
}
