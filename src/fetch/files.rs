// src/fetch/files.rs
use anyhow::{Context, Result};
use reqwest::Client;
use sha2::{Digest, Sha256};
use std::path::Path;
use tokio::fs;

/// Download a workbook and save it at `dest`, returning the sha256 of the
/// bytes. The hash is what decides whether re-parsing is necessary, so it is
/// computed from exactly what was written.
pub async fn download_file(client: &Client, url: &str, dest: impl AsRef<Path>) -> Result<String> {
    let dest = dest.as_ref();
    let resp = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("requesting {url}"))?
        .error_for_status()
        .with_context(|| format!("downloading {url}"))?;
    let bytes = resp.bytes().await?;

    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).await?;
    }
    fs::write(dest, &bytes)
        .await
        .with_context(|| format!("writing {}", dest.display()))?;

    Ok(sha256_hex(&bytes))
}

/// Hex-encoded sha256 content hash.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}
