//! Detector artifact cache: download missing ONNX models once, verify, reuse.

use crate::config::Config;
use sha2::{Digest, Sha256};
use skinalyze_core::{Condition, ModelPaths};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ArtifactError {
    #[error("downloading {url}: {source}")]
    Download {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("downloading {url}: HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("checksum mismatch for {url}: expected {expected}, got {actual}")]
    Checksum {
        url: String,
        expected: String,
        actual: String,
    },
    #[error("{path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// One artifact to make available on disk.
pub struct ArtifactSpec<'a> {
    pub path: &'a Path,
    pub url: String,
    /// Lowercase or uppercase hex SHA-256; `None` skips verification.
    pub sha256: Option<&'a str>,
}

/// Make sure every detector artifact is present locally, downloading as needed.
pub async fn ensure_all(config: &Config) -> Result<ModelPaths, ArtifactError> {
    let client = reqwest::Client::new();
    let paths = config.model_paths();

    for condition in Condition::ALL {
        let spec = ArtifactSpec {
            path: paths.get(condition),
            url: config.artifact_url(condition),
            sha256: config.checksum(condition),
        };
        ensure_artifact(&client, &spec).await?;
    }

    Ok(paths)
}

/// Returns `true` if the artifact had to be downloaded.
pub async fn ensure_artifact(
    client: &reqwest::Client,
    spec: &ArtifactSpec<'_>,
) -> Result<bool, ArtifactError> {
    let present = tokio::fs::try_exists(spec.path)
        .await
        .map_err(|e| io_error(spec.path, e))?;
    if present {
        let Some(expected) = spec.sha256 else {
            tracing::debug!(path = %spec.path.display(), "using cached artifact");
            return Ok(false);
        };

        let cached = tokio::fs::read(spec.path).await.map_err(|e| io_error(spec.path, e))?;
        if sha256_hex(&cached).eq_ignore_ascii_case(expected) {
            tracing::debug!(path = %spec.path.display(), "cached artifact verified");
            return Ok(false);
        }
        tracing::warn!(
            path = %spec.path.display(),
            "cached artifact checksum mismatch; downloading again"
        );
    }

    tracing::info!(url = %spec.url, path = %spec.path.display(), "downloading model artifact");

    let download_error = |source: reqwest::Error| ArtifactError::Download {
        url: spec.url.clone(),
        source,
    };
    let response = client.get(&spec.url).send().await.map_err(download_error)?;
    let status = response.status();
    if !status.is_success() {
        return Err(ArtifactError::Status {
            url: spec.url.clone(),
            status: status.as_u16(),
        });
    }
    let bytes = response.bytes().await.map_err(download_error)?;

    if let Some(expected) = spec.sha256 {
        let actual = sha256_hex(&bytes);
        if !actual.eq_ignore_ascii_case(expected) {
            return Err(ArtifactError::Checksum {
                url: spec.url.clone(),
                expected: expected.to_string(),
                actual,
            });
        }
    }

    if let Some(parent) = spec.path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| io_error(parent, e))?;
    }

    // Write beside the target and rename, so a partial download is never loaded.
    let partial = spec.path.with_extension("onnx.part");
    tokio::fs::write(&partial, &bytes)
        .await
        .map_err(|e| io_error(&partial, e))?;
    tokio::fs::rename(&partial, spec.path)
        .await
        .map_err(|e| io_error(spec.path, e))?;

    tracing::info!(path = %spec.path.display(), bytes = bytes.len(), "artifact downloaded");
    Ok(true)
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    Sha256::digest(bytes)
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

fn io_error(path: &Path, source: std::io::Error) -> ArtifactError {
    ArtifactError::Io {
        path: path.display().to_string(),
        source,
    }
}
