//! Capturing HTTP endpoint for channel tests

use axum::{Router, body::Bytes, extract::State, http::StatusCode, routing::post};
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;

type BodySlot = Arc<Mutex<Option<oneshot::Sender<String>>>>;

/// Serves `POST /hook`, answering with `status`; the receiver yields the first request body
pub(crate) async fn capture_server(status: u16) -> (String, oneshot::Receiver<String>) {
    let (tx, rx) = oneshot::channel();
    let slot: BodySlot = Arc::new(Mutex::new(Some(tx)));
    let status = StatusCode::from_u16(status).unwrap();

    let app = Router::new()
        .route(
            "/hook",
            post(move |State(slot): State<BodySlot>, body: Bytes| async move {
                let sender = slot.lock().unwrap().take();
                if let Some(sender) = sender {
                    let _ = sender.send(String::from_utf8_lossy(&body).to_string());
                }
                (status, "ok")
            }),
        )
        .with_state(slot);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}/hook", listener.local_addr().unwrap());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (url, rx)
}
