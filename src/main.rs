//! LRU Memcache snapshot inspector
//!
//! Loads a persisted snapshot and prints a JSON summary of its contents
//! without needing to know the cached value type.
//!
//! ```text
//! lru_memcache inspect <snapshot.bin>
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use serde_json::json;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lru_memcache::{Config, Snapshot};

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lru_memcache=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut args = std::env::args().skip(1);
    let (Some(command), path) = (args.next(), args.next()) else {
        eprintln!("usage: lru_memcache inspect <snapshot.bin>");
        return Ok(ExitCode::FAILURE);
    };

    match (command.as_str(), path) {
        ("inspect", Some(path)) => {
            inspect(resolve(PathBuf::from(path))).await?;
            Ok(ExitCode::SUCCESS)
        }
        _ => {
            eprintln!("usage: lru_memcache inspect <snapshot.bin>");
            Ok(ExitCode::FAILURE)
        }
    }
}

/// Relative paths are looked up in the configured snapshot directory.
fn resolve(path: PathBuf) -> PathBuf {
    if path.is_absolute() || path.exists() {
        return path;
    }
    let config = Config::from_env();
    config.snapshot_dir.join(path)
}

async fn inspect(path: PathBuf) -> anyhow::Result<()> {
    info!(path = %path.display(), "inspecting snapshot");
    let snapshot = Snapshot::from_file(&path)
        .await
        .with_context(|| format!("failed to load snapshot {}", path.display()))?;

    let captured_at = chrono::DateTime::from_timestamp_micros(snapshot.version)
        .map(|t| t.to_rfc3339());
    let nodes: Vec<_> = snapshot
        .nodes
        .iter()
        .map(|node| json!({ "key": node.key, "value_bytes": node.value.len() }))
        .collect();

    let summary = json!({
        "path": path.display().to_string(),
        "version": snapshot.version,
        "captured_at": captured_at,
        "size": snapshot.size,
        "cap": snapshot.cap,
        "nodes": nodes,
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
