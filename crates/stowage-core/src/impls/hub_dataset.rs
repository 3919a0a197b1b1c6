//! HubDatasetProducer - dataset hub からスナップショットを取得する Producer
//!
//! # 実装
//! 1. `/api/<type>s/<repo>` でリポジトリを解決（repo_type 未指定なら
//!    dataset → model → space の順に試す）
//! 2. アーカイブ（.zip / .tar.gz / .7z）があれば名前が最大のものをそのまま取得
//! 3. 無ければ全ファイルを取得して `<short>_backup_<ts>.tar.gz` にまとめる

use std::fs::File;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use flate2::Compression;
use flate2::write::GzEncoder;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use tokio::io::AsyncWriteExt;

use crate::domain::artifact::archive_file_name;
use crate::domain::target::DATASET_EXTENSIONS;
use crate::domain::{ArtifactSpec, DatasetSource, ProducerError, RepoType, Source};
use crate::ports::{Clock, Producer};

use super::url_path::encode_path;

pub const DEFAULT_HUB_ENDPOINT: &str = "https://huggingface.co";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HubConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_endpoint() -> String {
    DEFAULT_HUB_ENDPOINT.to_string()
}

fn default_timeout_secs() -> u64 {
    600
}

#[derive(Debug, Deserialize)]
struct RepoInfo {
    #[serde(default)]
    siblings: Vec<Sibling>,
}

#[derive(Debug, Deserialize)]
struct Sibling {
    rfilename: String,
}

pub struct HubDatasetProducer {
    client: Client,
    endpoint: String,
    clock: Arc<dyn Clock>,
}

impl HubDatasetProducer {
    pub fn new(config: &HubConfig, clock: Arc<dyn Clock>) -> Result<Self, ProducerError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ProducerError::Request(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            clock,
        })
    }

    fn get(&self, url: &str, token: Option<&str>) -> RequestBuilder {
        let request = self.client.get(url);
        match token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Find the repository and list its files.
    async fn resolve(&self, source: &DatasetSource) -> Result<(RepoType, Vec<String>), ProducerError> {
        let candidates: Vec<RepoType> = match source.repo_type {
            Some(repo_type) => vec![repo_type],
            None => RepoType::ALL.to_vec(),
        };

        let mut tried = Vec::new();
        for repo_type in candidates {
            let url = format!(
                "{}/api/{}/{}",
                self.endpoint,
                repo_type.api_segment(),
                source.repo
            );
            let response = self
                .get(&url, source.token.as_deref())
                .send()
                .await
                .map_err(|e| ProducerError::Request(e.to_string()))?;

            match response.status() {
                StatusCode::NOT_FOUND | StatusCode::UNAUTHORIZED => {
                    tracing::debug!(repo = %source.repo, %repo_type, "repository not found as this type");
                    tried.push(repo_type.to_string());
                }
                status if status.is_success() => {
                    let info: RepoInfo = response
                        .json()
                        .await
                        .map_err(|e| ProducerError::Request(e.to_string()))?;
                    let files = info.siblings.into_iter().map(|s| s.rfilename).collect();
                    return Ok((repo_type, files));
                }
                status => {
                    return Err(ProducerError::HubStatus {
                        status: status.as_u16(),
                        url,
                    });
                }
            }
        }

        Err(ProducerError::RepositoryNotFound {
            repo: source.repo.clone(),
            tried,
        })
    }

    async fn download(
        &self,
        source: &DatasetSource,
        repo_type: RepoType,
        file: &str,
        dest: &Path,
    ) -> Result<(), ProducerError> {
        let url = resolve_url(&self.endpoint, repo_type, &source.repo, file);
        let mut response = self
            .get(&url, source.token.as_deref())
            .send()
            .await
            .map_err(|e| ProducerError::Request(e.to_string()))?;
        if !response.status().is_success() {
            return Err(ProducerError::HubStatus {
                status: response.status().as_u16(),
                url,
            });
        }

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut out = tokio::fs::File::create(dest).await?;
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| ProducerError::Request(e.to_string()))?
        {
            out.write_all(&chunk).await?;
        }
        out.flush().await?;
        Ok(())
    }
}

#[async_trait]
impl Producer for HubDatasetProducer {
    async fn produce(&self, spec: &ArtifactSpec, workdir: &Path) -> Result<PathBuf, ProducerError> {
        let Source::Dataset(source) = &spec.source else {
            return Err(ProducerError::Other(format!(
                "{} is not a dataset target",
                spec.name
            )));
        };

        let (repo_type, files) = self.resolve(source).await?;

        if let Some(archive) = latest_archive(&files) {
            let local = workdir.join(safe_relative(archive)?.file_name().unwrap_or_default());
            tracing::debug!(repo = %source.repo, archive, "downloading existing archive");
            self.download(source, repo_type, archive, &local).await?;
            return Ok(local);
        }

        let snapshot = workdir.join("snapshot");
        tokio::fs::create_dir_all(&snapshot).await?;
        for file in &files {
            let dest = snapshot.join(safe_relative(file)?);
            self.download(source, repo_type, file, &dest).await?;
        }

        let archive = workdir.join(archive_file_name(&spec.prefix, self.clock.now(), ".tar.gz"));
        let root = spec.name.short_name().to_string();
        pack(snapshot, archive.clone(), root).await?;
        Ok(archive)
    }
}

/// Lexicographically greatest archive in the repository.
fn latest_archive(files: &[String]) -> Option<&str> {
    files
        .iter()
        .map(String::as_str)
        .filter(|f| DATASET_EXTENSIONS.iter().any(|ext| f.ends_with(ext)))
        .max()
}

fn resolve_url(endpoint: &str, repo_type: RepoType, repo: &str, file: &str) -> String {
    format!(
        "{endpoint}/{}{repo}/resolve/main/{}",
        repo_type.resolve_prefix(),
        encode_path(file)
    )
}

/// Repository file names must stay inside the snapshot directory.
fn safe_relative(file: &str) -> Result<&Path, ProducerError> {
    let path = Path::new(file);
    if path.components().all(|c| matches!(c, Component::Normal(_))) {
        Ok(path)
    } else {
        Err(ProducerError::Other(format!("refusing repository path `{file}`")))
    }
}

/// tar.gz `dir` into `archive`, entries under `root/`.
async fn pack(dir: PathBuf, archive: PathBuf, root: String) -> Result<(), ProducerError> {
    tokio::task::spawn_blocking(move || -> std::io::Result<()> {
        let encoder = GzEncoder::new(File::create(&archive)?, Compression::default());
        let mut builder = tar::Builder::new(encoder);
        builder.append_dir_all(&root, &dir)?;
        builder.into_inner()?.finish()?;
        Ok(())
    })
    .await
    .map_err(|e| ProducerError::Other(format!("archiving task failed: {e}")))??;
    Ok(())
}
