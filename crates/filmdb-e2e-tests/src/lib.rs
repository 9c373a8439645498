pub mod rest;

use std::fmt::Display;

use anyhow::{Result, anyhow};
use filmdb_server::{
    config::{Parser, ServerConfig},
    run::{build_state, run_graceful_with_state},
};
use rand::Rng as _;
use tempfile::TempDir;
use tracing::{debug, error};
use url::Url;

fn random_port() -> Result<u16> {
    let mut rng = rand::rng();

    let mut retries = 3;
    while retries > 0 {
        let port: u16 = rng.random_range(3030..4030);
        let addr: std::net::SocketAddr = format!("127.0.0.1:{}", port).parse()?;
        match std::net::TcpStream::connect_timeout(&addr, std::time::Duration::from_millis(100)) {
            Err(e) if e.kind() == std::io::ErrorKind::ConnectionRefused => return Ok(port),
            Err(_) => retries -= 1,
            Ok(_) => retries -= 1,
        }
    }

    Err(anyhow!("Could not find a free port"))
}

pub struct ConfigGuard {
    #[allow(dead_code)]
    data_dir: TempDir,
}

pub async fn prepare_env(test_name: &str) -> Result<(ServerConfig, ConfigGuard)> {
    let tmp_data_dir = TempDir::with_prefix(format!("{}_", test_name))?;
    let data_dir = tmp_data_dir.path().to_string_lossy().to_string();
    let port = random_port()?.to_string();
    let args = &[
        "filmdb-e2e-tests",
        "--data-dir",
        &data_dir,
        "--port",
        &port,
        "--default-page-size",
        "10",
    ];
    let config = ServerConfig::try_parse_from(args)?;
    Ok((
        config,
        ConfigGuard {
            data_dir: tmp_data_dir,
        },
    ))
}

pub fn base_url(config: &ServerConfig) -> Result<Url> {
    let url = format!("http://127.0.0.1:{}/", config.port).parse()?;
    Ok(url)
}

pub fn extend_url(url: &Url, segment: impl Display) -> Url {
    let mut url = url.clone();
    url.path_segments_mut()
        .expect("base url")
        .push(&segment.to_string());
    url
}

/// Starts server in background task and waits till it responds
pub async fn launch_env(args: ServerConfig) -> Result<(reqwest::Client, Url)> {
    let base_url = base_url(&args)?;
    let state = build_state(&args).await?;
    tokio::spawn(async move {
        if let Err(e) = run_graceful_with_state(args, state, futures::future::pending()).await {
            error!("Server error: {e}");
        }
    });

    let client = reqwest::Client::new();
    let health_url = base_url.join("health")?;
    for _ in 0..50 {
        match client.get(health_url.clone()).send().await {
            Ok(response) if response.status().is_success() => return Ok((client, base_url)),
            Ok(response) => debug!("Server not ready: {}", response.status()),
            Err(e) => debug!("Server not ready: {e}"),
        }
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    }
    Err(anyhow!("Server did not start"))
}
