//! Test server management.
//!
//! Spawns and manages `impush` instances for integration testing.

#![allow(dead_code)]

use std::path::PathBuf;
use std::process::{Child, Command};
use std::time::Duration;
use tokio::time::sleep;

/// A running `impush` instance, reachable over its ingress and metrics
/// ports.
pub struct TestServer {
    child: Child,
    ingress_port: u16,
    metrics_port: u16,
    data_dir: PathBuf,
}

impl TestServer {
    /// Spawn a new test server with the dummy push provider and the given
    /// ports.
    pub async fn spawn(ingress_port: u16, metrics_port: u16) -> anyhow::Result<Self> {
        Self::spawn_with_provider(ingress_port, metrics_port, "dummy").await
    }

    /// Spawn a test server with `push.enable` set to `provider`.
    pub async fn spawn_with_provider(ingress_port: u16, metrics_port: u16, provider: &str) -> anyhow::Result<Self> {
        let data_dir = std::env::temp_dir().join(format!("impush-test-{}", ingress_port));
        std::fs::create_dir_all(&data_dir)?;

        let config_path = data_dir.join("config.toml");
        let config_content = format!(
            r#"
[server]
name = "test-impush"
metrics_port = {metrics_port}
ingress_port = {ingress_port}

[push]
enable = "{provider}"
"#,
        );
        std::fs::write(&config_path, config_content)?;

        let cargo_manifest_dir = env!("CARGO_MANIFEST_DIR");
        let binary_path = PathBuf::from(cargo_manifest_dir).join("target/debug/impush");

        let child = Command::new(&binary_path)
            .arg(config_path.to_str().unwrap())
            .spawn()?;

        let server = Self {
            child,
            ingress_port,
            metrics_port,
            data_dir,
        };

        server.wait_until_ready().await?;
        Ok(server)
    }

    async fn wait_until_ready(&self) -> anyhow::Result<()> {
        for _ in 0..50 {
            if tokio::net::TcpStream::connect(("127.0.0.1", self.ingress_port)).await.is_ok() {
                return Ok(());
            }
            sleep(Duration::from_millis(100)).await;
        }
        anyhow::bail!("server failed to start within 5 seconds")
    }

    pub fn ingress_url(&self, path: &str) -> String {
        format!("http://127.0.0.1:{}{}", self.ingress_port, path)
    }

    pub fn metrics_url(&self, path: &str) -> String {
        format!("http://127.0.0.1:{}{}", self.metrics_port, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
        let _ = std::fs::remove_dir_all(&self.data_dir);
    }
}
