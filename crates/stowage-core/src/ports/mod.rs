//! Ports - 抽象化レイヤー
//!
//! このモジュールは Hexagonal Architecture の「ポート」を定義します。
//! core（scheduler / job / orchestrator）は外部のストア・ダンプツール・
//! ログ出力にこれらの trait 経由でのみアクセスします。

pub mod artifact_store;
pub mod clock;
pub mod event_sink;
pub mod id_generator;
pub mod producer;

// 主要な trait を再エクスポート
pub use self::artifact_store::ArtifactStore;
pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::event_sink::{EventSink, NoopEventSink};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::producer::Producer;
