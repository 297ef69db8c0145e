//! Webhook HTTP Server
//!
//! Axum server that receives Twilio WhatsApp webhooks and hands each message
//! to the router on its own task. Graceful shutdown on Ctrl+C / SIGTERM.

use axum::{
    extract::{Form, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info};

use crate::channels::{TwilioWebhookData, WhatsAppChannel};
use crate::router::MessageRouter;

/// Empty TwiML: replies go out through the REST API, not the webhook response
const EMPTY_TWIML: &str = r#"<?xml version="1.0" encoding="UTF-8"?><Response></Response>"#;

/// Shared handler state
pub struct AppState {
    router: Arc<MessageRouter>,
    channel: Arc<WhatsAppChannel>,
    started: Instant,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    uptime_secs: u64,
    mode: &'static str,
}

/// Webhook server
pub struct WebhookServer {
    port: u16,
    state: Arc<AppState>,
}

impl WebhookServer {
    pub fn new(port: u16, router: Arc<MessageRouter>, channel: Arc<WhatsAppChannel>) -> Self {
        Self {
            port,
            state: Arc::new(AppState {
                router,
                channel,
                started: Instant::now(),
            }),
        }
    }

    /// Build the router with all routes and middleware
    fn build_router(&self) -> Router {
        Router::new()
            .route("/health", get(health_handler))
            .route("/whatsapp/webhook", post(webhook_handler))
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Start the server and run until shutdown signal
    pub async fn run(self) -> anyhow::Result<()> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let router = self.build_router();

        info!("Webhook server listening on {}", addr);
        info!("Twilio webhook URL: http://<host>:{}/whatsapp/webhook", self.port);

        let listener = tokio::net::TcpListener::bind(addr).await?;

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        info!("Webhook server shut down gracefully");
        Ok(())
    }
}

async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: state.started.elapsed().as_secs(),
        mode: state.router.mode().as_str(),
    })
}

/// Acknowledge immediately; the reply is sent asynchronously
async fn webhook_handler(
    State(state): State<Arc<AppState>>,
    Form(data): Form<TwilioWebhookData>,
) -> impl IntoResponse {
    debug!("Webhook {} from {}", data.message_sid, data.from);
    let event = state.channel.parse_webhook(&data);

    let router = state.router.clone();
    tokio::spawn(async move {
        router.handle(event).await;
    });

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/xml")],
        EMPTY_TWIML,
    )
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assistant::{ReplyGenerator, ReplyRequest};
    use crate::channels::{ChannelError, Transport, WhatsAppConfig};
    use crate::persona::Persona;
    use crate::router::RouterConfig;
    use crate::store::Store;
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use parking_lot::Mutex;
    use tempfile::TempDir;
    use tower::ServiceExt;

    #[derive(Default)]
    struct RecordingTransport {
        sent: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl Transport for RecordingTransport {
        fn name(&self) -> &str {
            "recording"
        }

        async fn send(&self, recipient: &str, text: &str) -> Result<String, ChannelError> {
            self.sent.lock().push((recipient.to_string(), text.to_string()));
            Ok(String::new())
        }
    }

    struct FixedGenerator;

    #[async_trait]
    impl ReplyGenerator for FixedGenerator {
        async fn generate(&self, _request: ReplyRequest<'_>) -> String {
            "[Assistant] ok".to_string()
        }
    }

    fn server() -> (TempDir, Arc<RecordingTransport>, WebhookServer) {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(Store::open(&dir.path().join("test.db")).unwrap());
        let transport = Arc::new(RecordingTransport::default());
        let router = MessageRouter::new(
            store,
            Arc::new(FixedGenerator),
            transport.clone(),
            Persona::default(),
            RouterConfig {
                reply_delay_ms: (0, 0),
                ..RouterConfig::default()
            },
        );
        let channel = Arc::new(WhatsAppChannel::new(WhatsAppConfig {
            account_sid: "AC1".to_string(),
            auth_token: "token".to_string(),
            whatsapp_number: "+14155238886".to_string(),
            max_message_length: 4096,
        }));
        (dir, transport, WebhookServer::new(0, router, channel))
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let (_dir, _transport, server) = server();
        let app = server.build_router();

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["mode"], "assistant");
        assert!(json["uptime_secs"].is_number());
    }

    #[tokio::test]
    async fn test_webhook_dispatches_to_router() {
        let (_dir, transport, server) = server();
        let app = server.build_router();

        let form = "MessageSid=SM1&AccountSid=AC1&From=whatsapp%3A%2B5511999990000\
            &To=whatsapp%3A%2B14155238886&Body=Hi%2C+I%27m+Maria&NumMedia=0";
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/whatsapp/webhook")
                    .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                    .body(Body::from(form))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(String::from_utf8_lossy(&body).contains("<Response>"));

        for _ in 0..50 {
            if !transport.sent.lock().is_empty() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }

        let sent = transport.sent.lock();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "+5511999990000");
        assert!(sent[0].1.contains("Maria"));
    }

    #[tokio::test]
    async fn test_malformed_webhook_rejected() {
        let (_dir, _transport, server) = server();
        let app = server.build_router();

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/whatsapp/webhook")
                    .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                    .body(Body::from("Body=hello"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert!(response.status().is_client_error());
    }
}
