//! WebDavStore - WebDAV サーバー上の ArtifactStore
//!
//! # 対応表
//! - exists: `PROPFIND` (Depth: 0)
//! - mkdir: `MKCOL`
//! - list: `PROPFIND` (Depth: 1)。404 は空の一覧、コレクション自身と
//!   サブコレクションは除外、href は percent-decode する
//! - upload: `PUT`
//! - delete: `DELETE`
//!
//! 認証は Basic、タイムアウトはリクエストごとに Client 側で設定する。

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use percent_encoding::percent_decode_str;
use quick_xml::Reader;
use quick_xml::events::Event;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};

use crate::domain::{RemotePath, StoreError};
use crate::ports::ArtifactStore;

use super::url_path::encode_path;

pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

const PROPFIND_BODY: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<d:propfind xmlns:d="DAV:"><d:prop><d:resourcetype/></d:prop></d:propfind>"#;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebDavConfig {
    pub url: String,
    pub username: String,
    pub password: String,
    pub timeout_secs: u64,
}

pub struct WebDavStore {
    client: Client,
    base_url: String,
    username: String,
    password: String,
    propfind: Method,
    mkcol: Method,
}

impl WebDavStore {
    pub fn new(config: &WebDavConfig) -> Result<Self, StoreError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| StoreError::Request(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            username: config.username.clone(),
            password: config.password.clone(),
            propfind: extension_method(b"PROPFIND")?,
            mkcol: extension_method(b"MKCOL")?,
        })
    }

    fn url(&self, path: &RemotePath) -> String {
        format!("{}{}", self.base_url, encode_path(path.as_str()))
    }

    fn request(&self, method: Method, path: &RemotePath) -> RequestBuilder {
        self.client
            .request(method, self.url(path))
            .basic_auth(&self.username, Some(&self.password))
    }

    fn propfind_request(&self, path: &RemotePath, depth: &'static str) -> RequestBuilder {
        self.request(self.propfind.clone(), path)
            .header("Depth", depth)
            .header("Content-Type", "application/xml; charset=utf-8")
            .body(PROPFIND_BODY)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, StoreError> {
        request
            .send()
            .await
            .map_err(|e| StoreError::Request(e.to_string()))
    }
}

fn extension_method(name: &[u8]) -> Result<Method, StoreError> {
    Method::from_bytes(name).map_err(|e| StoreError::Other(e.to_string()))
}

fn status_error(method: &Method, path: &RemotePath, status: StatusCode) -> StoreError {
    StoreError::Status {
        method: method.to_string(),
        path: path.to_string(),
        status: status.as_u16(),
    }
}

#[async_trait]
impl ArtifactStore for WebDavStore {
    async fn exists(&self, path: &RemotePath) -> Result<bool, StoreError> {
        let response = self.send(self.propfind_request(path, "0")).await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(false),
            status if status.is_success() => Ok(true),
            status => Err(status_error(&self.propfind, path, status)),
        }
    }

    async fn mkdir(&self, path: &RemotePath) -> Result<(), StoreError> {
        let response = self.send(self.request(self.mkcol.clone(), path)).await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(status_error(&self.mkcol, path, response.status()))
        }
    }

    async fn list(&self, dir: &RemotePath) -> Result<Vec<String>, StoreError> {
        let response = self.send(self.propfind_request(dir, "1")).await?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        if !status.is_success() {
            return Err(status_error(&self.propfind, dir, status));
        }

        let body = response
            .text()
            .await
            .map_err(|e| StoreError::Request(e.to_string()))?;
        parse_listing(dir, &body)
    }

    async fn upload(&self, local: &Path, remote: &RemotePath) -> Result<(), StoreError> {
        let body = tokio::fs::read(local).await?;
        let response = self.send(self.request(Method::PUT, remote).body(body)).await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(status_error(&Method::PUT, remote, response.status()))
        }
    }

    async fn delete(&self, remote: &RemotePath) -> Result<(), StoreError> {
        let response = self.send(self.request(Method::DELETE, remote)).await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(status_error(&Method::DELETE, remote, response.status()))
        }
    }
}

#[derive(Default)]
struct Entry {
    href: String,
    collection: bool,
}

/// File names in a `207 Multi-Status` body for `dir`.
fn parse_listing(dir: &RemotePath, body: &str) -> Result<Vec<String>, StoreError> {
    let malformed = |reason: String| StoreError::MalformedListing {
        path: dir.to_string(),
        reason,
    };

    let mut reader = Reader::from_str(body);
    reader.config_mut().trim_text(true);

    let mut entries = Vec::new();
    let mut current: Option<Entry> = None;
    let mut in_href = false;
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"response" => current = Some(Entry::default()),
                b"href" => in_href = true,
                b"collection" => {
                    if let Some(entry) = current.as_mut() {
                        entry.collection = true;
                    }
                }
                _ => {}
            },
            Ok(Event::Empty(e)) => {
                if e.local_name().as_ref() == b"collection"
                    && let Some(entry) = current.as_mut()
                {
                    entry.collection = true;
                }
            }
            Ok(Event::Text(t)) => {
                if in_href && let Some(entry) = current.as_mut() {
                    let text = t.unescape().map_err(|e| malformed(e.to_string()))?;
                    entry.href.push_str(&text);
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"href" => in_href = false,
                b"response" => entries.extend(current.take()),
                _ => {}
            },
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(malformed(e.to_string())),
        }
    }

    // コレクション自身もサブコレクションも collection か末尾 `/` の href
    let names = entries
        .into_iter()
        .filter(|entry| !entry.collection)
        .map(|entry| decoded_href_path(&entry.href))
        .filter(|path| !path.ends_with('/'))
        .filter_map(|path| path.rsplit('/').next().map(str::to_string))
        .filter(|name| !name.is_empty())
        .collect();
    Ok(names)
}

/// Path part of an href (absolute URL or absolute path), percent-decoded.
fn decoded_href_path(href: &str) -> String {
    let path = match href.split_once("://") {
        Some((_, rest)) => rest.find('/').map_or("/", |i| &rest[i..]),
        None => href,
    };
    percent_decode_str(path).decode_utf8_lossy().into_owned()
}
