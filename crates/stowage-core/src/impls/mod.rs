//! Impls - ports の実装
//!
//! # 本番用
//! - **WebDavStore**: WebDAV サーバー上の ArtifactStore
//! - **HubDatasetProducer**: dataset hub のスナップショット取得
//! - **DumpProducer**: database ダンプツールの呼び出し
//! - **TracingEventSink**: イベントを tracing で出力
//!
//! # テスト・ローカル用
//! - **InMemoryStore**: 呼び出しを記録する ArtifactStore
//! - **ScriptedProducer**: 決め打ちの artifact を作る Producer
//! - **RecordingEventSink**: イベントを溜めておく EventSink

pub mod dump;
pub mod hub_dataset;
pub mod memory_store;
pub mod scripted;
pub mod tracing_sink;
mod url_path;
pub mod webdav;

#[cfg(test)]
mod http_stub;

// 主要な型を再エクスポート
pub use self::dump::DumpProducer;
pub use self::hub_dataset::{HubConfig, HubDatasetProducer};
pub use self::memory_store::{InMemoryStore, StoreCall};
pub use self::scripted::ScriptedProducer;
pub use self::tracing_sink::{RecordingEventSink, TracingEventSink};
pub use self::webdav::{WebDavConfig, WebDavStore};
