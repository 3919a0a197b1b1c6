//! テスト用 HTTP スタブ（`127.0.0.1:0` で待ち受ける axum サーバー）
//!
//! 応答は `(method, path) -> (status, body)` のクロージャで決める。
//! 受けたリクエストは `"METHOD /path"` の形で記録する。

use std::sync::{Arc, Mutex, PoisonError};

use axum::Router;
use axum::extract::State;
use axum::http::{Method, StatusCode, Uri};
use tokio::sync::oneshot;

type Respond = dyn Fn(&str, &str) -> (u16, String) + Send + Sync;

#[derive(Clone)]
struct StubState {
    respond: Arc<Respond>,
    seen: Arc<Mutex<Vec<String>>>,
}

pub(crate) struct StubServer {
    base_url: String,
    seen: Arc<Mutex<Vec<String>>>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    _task: tokio::task::JoinHandle<()>,
}

impl StubServer {
    pub(crate) async fn start<F>(respond: F) -> Self
    where
        F: Fn(&str, &str) -> (u16, String) + Send + Sync + 'static,
    {
        let state = StubState {
            respond: Arc::new(respond),
            seen: Arc::default(),
        };
        let seen = state.seen.clone();
        let app = Router::new().fallback(handle).with_state(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind stub listener");
        let base_url = format!("http://{}", listener.local_addr().expect("stub address"));
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let server = axum::serve(listener, app).with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            });
            let _ = server.await;
        });

        Self {
            base_url,
            seen,
            shutdown_tx: Some(shutdown_tx),
            _task: task,
        }
    }

    pub(crate) fn url(&self) -> &str {
        &self.base_url
    }

    /// Requests received so far, in arrival order.
    pub(crate) fn requests(&self) -> Vec<String> {
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Drop for StubServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

async fn handle(State(state): State<StubState>, method: Method, uri: Uri) -> (StatusCode, String) {
    let path = uri.path();
    state
        .seen
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .push(format!("{method} {path}"));
    let (status, body) = (state.respond)(method.as_str(), path);
    (
        StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        body,
    )
}
