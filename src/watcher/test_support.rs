//! Fake Slack webhook for watcher tests

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use serde_json::Value;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

#[derive(Clone)]
struct WebhookState {
    received: mpsc::UnboundedSender<Value>,
    status: StatusCode,
}

async fn receive(State(state): State<WebhookState>, Json(body): Json<Value>) -> StatusCode {
    let _ = state.received.send(body);
    state.status
}

/// Records every JSON payload posted to `/hook` and answers with `status`
pub struct FakeWebhook {
    pub url: String,
    received: mpsc::UnboundedReceiver<Value>,
    handle: JoinHandle<()>,
}

impl FakeWebhook {
    pub async fn start(status: StatusCode) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let app = Router::new()
            .route("/hook", post(receive))
            .with_state(WebhookState {
                received: tx,
                status,
            });

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind webhook listener");
        let addr = listener.local_addr().expect("Listener has no address");
        let handle = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self {
            url: format!("http://{}/hook", addr),
            received: rx,
            handle,
        }
    }

    /// Next payload, or `None` if nothing arrives within `wait`
    pub async fn next(&mut self, wait: Duration) -> Option<Value> {
        tokio::time::timeout(wait, self.received.recv())
            .await
            .ok()
            .flatten()
    }
}

impl Drop for FakeWebhook {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
