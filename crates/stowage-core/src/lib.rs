//! stowage-core
//!
//! Backup orchestration and retention for hosted datasets and databases.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（target, retention, artifact 命名, job 状態, errors, events）
//! - **ports**: 抽象化レイヤー（ArtifactStore, Producer, Clock, IdGenerator, EventSink）
//! - **app**: アプリケーションロジック（scheduler, job, orchestrator, builder, filter）
//! - **impls**: 実装（WebDavStore, HubDatasetProducer, DumpProducer, InMemoryStore など）
//! - **config**: TOML 設定の読み込みと検証
//! - **observability**: tracing subscriber の初期化

pub mod app;
pub mod config;
pub mod domain;
pub mod impls;
pub mod observability;
pub mod ports;
