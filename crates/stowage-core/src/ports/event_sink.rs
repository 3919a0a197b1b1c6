//! EventSink port - イベント記録の抽象化
//!
//! # 実装
//! - `impls::tracing_sink::TracingEventSink`: tracing でログ出力（本番用）
//! - `impls::tracing_sink::RecordingEventSink`: メモリに記録（テスト用）

use crate::domain::BackupEvent;

/// EventSink は BackupEvent を受け取る
///
/// 同期呼び出し。重い処理（ネットワーク送信など）は実装側でバッファすること。
pub trait EventSink: Send + Sync {
    fn emit(&self, event: BackupEvent);
}

/// 何もしない
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopEventSink;

impl EventSink for NoopEventSink {
    fn emit(&self, _event: BackupEvent) {}
}
