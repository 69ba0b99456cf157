//! HTTP webhook source
//!
//! Each `POST` to the configured path carries one raw console line in its body.
//! The line is handed to the handler before the request is acknowledged, and
//! every request is acknowledged with `{"received": true}` whatever the line
//! turns out to be.

use async_trait::async_trait;
use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, State},
    response::Json,
    routing::post,
    Router,
};
use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use tokio::net::TcpListener;
use tracing::info;

use super::{LineHandler, LineSource, SourceError};

/// Placeholder shown when no install path is configured
const INSTALL_PLACEHOLDER: &str = "PATH_TO_MINECRAFT_SERVER_INSTALL";
/// Placeholder shown when no public URL is configured
const URL_PLACEHOLDER: &str = "YOUR_URL";
/// grep pattern forwarding chat lines only
const CHAT_ONLY_MATCH: &str = ": <";

/// Webhook listener configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    /// Endpoint path receiving lines
    #[serde(default = "default_path")]
    pub path: String,
    /// Listen port, overridden by the `PORT` environment variable
    #[serde(default = "default_port")]
    pub port: u16,
    /// Log the shell pipeline to run on the Minecraft host
    #[serde(default = "default_show_init_message")]
    pub show_init_message: bool,
    /// Minecraft server install directory, used in the setup instructions
    #[serde(default)]
    pub minecraft_install_path: Option<PathBuf>,
    /// Public URL/IP of this host, used in the setup instructions
    #[serde(default)]
    pub public_url: Option<String>,
}

fn default_path() -> String {
    "/minecraft/hook".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_show_init_message() -> bool {
    true
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            path: default_path(),
            port: default_port(),
            show_init_message: default_show_init_message(),
            minecraft_install_path: None,
            public_url: None,
        }
    }
}

impl WebhookConfig {
    /// Listen port after applying the `PORT` environment override
    pub fn effective_port(&self) -> u16 {
        resolve_port(std::env::var("PORT").ok().as_deref(), self.port)
    }

    /// Endpoint path with a guaranteed leading `/`
    pub fn route_path(&self) -> String {
        if self.path.starts_with('/') {
            self.path.clone()
        } else {
            format!("/{}", self.path)
        }
    }
}

/// Pick the environment port when it is a valid non-zero port
pub fn resolve_port(env_value: Option<&str>, configured: u16) -> u16 {
    env_value
        .and_then(|v| v.trim().parse::<u16>().ok())
        .filter(|port| *port != 0)
        .unwrap_or(configured)
}

/// Acknowledgment body
#[derive(Debug, Serialize, Deserialize)]
pub struct Ack {
    pub received: bool,
}

#[derive(Clone)]
struct WebhookState {
    handler: LineHandler,
}

/// Build the webhook router
///
/// Bodies are unbounded: an oversized line is still acknowledged.
pub fn router(path: &str, handler: LineHandler) -> Router {
    Router::new()
        .route(path, post(receive_line))
        .layer(DefaultBodyLimit::disable())
        .with_state(WebhookState { handler })
}

/// POST <path> - receive one raw line
async fn receive_line(State(state): State<WebhookState>, body: Bytes) -> Json<Ack> {
    if !body.is_empty() {
        let line = String::from_utf8_lossy(&body).into_owned();
        (state.handler)(line);
    }
    Json(Ack { received: true })
}

/// Source accepting lines pushed over HTTP
pub struct WebhookSource {
    config: WebhookConfig,
    listener: TcpListener,
}

impl WebhookSource {
    /// Bind `0.0.0.0` on the effective port
    pub async fn bind(config: WebhookConfig) -> Result<Self, SourceError> {
        let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, config.effective_port()));
        Self::bind_to(config, addr).await
    }

    /// Bind an explicit address
    pub async fn bind_to(config: WebhookConfig, addr: SocketAddr) -> Result<Self, SourceError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| SourceError::Bind {
                port: addr.port(),
                source,
            })?;

        info!("Bot listening on *:{}", listener.local_addr()?.port());

        Ok(Self { config, listener })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, SourceError> {
        Ok(self.listener.local_addr()?)
    }
}

#[async_trait]
impl LineSource for WebhookSource {
    fn name(&self) -> &'static str {
        "webhook"
    }

    async fn run(self: Box<Self>, handler: LineHandler) -> Result<(), SourceError> {
        let path = self.config.route_path();
        info!("Accepting console lines on POST {}", path);

        axum::serve(self.listener, router(&path, handler))
            .await
            .map_err(|e| SourceError::Server(e.to_string()))
    }
}

/// Instructions for forwarding a remote server's log to this webhook
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetupInstructions {
    /// Placeholder replacement hints
    pub hints: Vec<String>,
    /// Shell pipeline to run on the Minecraft host
    pub command: String,
    /// Extra note when more than chat lines are forwarded
    pub note: Option<String>,
}

impl SetupInstructions {
    pub fn log(&self) {
        info!("Please enter the following command on your server running the Minecraft server:");
        for hint in &self.hints {
            info!("       {}", hint);
        }
        info!("  `{}`", self.command);
        if let Some(note) = &self.note {
            info!("       {}", note);
        }
    }
}

/// Build the `tail | grep | curl` pipeline for the Minecraft host
///
/// Only chat lines are forwarded unless `forward_all_prefixed` is set, in which
/// case every line matching `server_prefix` is sent.
pub fn setup_command(
    config: &WebhookConfig,
    port: u16,
    server_prefix: &str,
    forward_all_prefixed: bool,
) -> SetupInstructions {
    let mut hints = Vec::new();
    match (&config.minecraft_install_path, &config.public_url) {
        (None, None) => hints.push(format!(
            "Replace \"{}\" with the path to your Minecraft server install and \"{}\" with the URL/IP of the server running Shulker.",
            INSTALL_PLACEHOLDER, URL_PLACEHOLDER
        )),
        (None, Some(_)) => hints.push(format!(
            "Replace \"{}\" with the path to your Minecraft server install",
            INSTALL_PLACEHOLDER
        )),
        (Some(_), None) => hints.push(format!(
            "Replace \"{}\" with the URL/IP of the server running Shulker",
            URL_PLACEHOLDER
        )),
        (Some(_), Some(_)) => {}
    }

    let install = config
        .minecraft_install_path
        .clone()
        .unwrap_or_else(|| PathBuf::from("/").join(INSTALL_PLACEHOLDER));
    let log_path = install.join("logs").join("latest.log");
    let url = config.public_url.as_deref().unwrap_or(URL_PLACEHOLDER);

    let grep_match = if forward_all_prefixed {
        server_prefix
    } else {
        CHAT_ONLY_MATCH
    };

    let command = format!(
        "tail -F {} | grep -P --line-buffered \"{}\" | while IFS= read -r x; do printf '%s\\n' \"$x\" | curl -X POST -d @- http://{}:{}{} ; done",
        log_path.display(),
        grep_match,
        url,
        port,
        config.route_path()
    );

    let note = (grep_match != CHAT_ONLY_MATCH).then(|| {
        "Please note that the above command can send a lot of requests to the server. Disable /me forwarding (\"show_player_me\") to reduce this if necessary.".to_string()
    });

    SetupInstructions {
        hints,
        command,
        note,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use std::sync::{Arc, Mutex};
    use tower::ServiceExt;

    fn collector() -> (LineHandler, Arc<Mutex<Vec<String>>>) {
        let lines = Arc::new(Mutex::new(Vec::new()));
        let sink = lines.clone();
        let handler: LineHandler = Arc::new(move |line| sink.lock().unwrap().push(line));
        (handler, lines)
    }

    fn post_request(body: impl Into<Body>) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/minecraft/hook")
            .body(body.into())
            .unwrap()
    }

    async fn ack_of(response: axum::response::Response) -> Ack {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_body_delivered_and_acknowledged() {
        let (handler, lines) = collector();
        let app = router("/minecraft/hook", handler);

        let response = app
            .oneshot(post_request("[Server thread/INFO]: <Alice> hi"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(ack_of(response).await.received);
        assert_eq!(
            *lines.lock().unwrap(),
            vec!["[Server thread/INFO]: <Alice> hi".to_string()]
        );
    }

    #[tokio::test]
    async fn test_empty_body_skips_handler() {
        let (handler, lines) = collector();
        let app = router("/minecraft/hook", handler);

        let response = app.oneshot(post_request(Body::empty())).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(ack_of(response).await.received);
        assert!(lines.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_utf8_still_acknowledged() {
        let (handler, lines) = collector();
        let app = router("/minecraft/hook", handler);

        let response = app
            .oneshot(post_request(vec![b'h', 0xff, b'i']))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(*lines.lock().unwrap(), vec!["h\u{FFFD}i".to_string()]);
    }

    #[tokio::test]
    async fn test_large_body_accepted() {
        let (handler, lines) = collector();
        let app = router("/minecraft/hook", handler);
        let body = "a".repeat(3 * 1024 * 1024);

        let response = app.oneshot(post_request(body.clone())).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(ack_of(response).await.received);
        assert_eq!(*lines.lock().unwrap(), vec![body]);
    }

    #[tokio::test]
    async fn test_other_paths_not_routed() {
        let (handler, lines) = collector();
        let app = router("/minecraft/hook", handler);

        let request = Request::builder()
            .method("POST")
            .uri("/other")
            .body(Body::from("line"))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(lines.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_live_webhook() {
        let config = WebhookConfig {
            path: "hook".to_string(),
            ..Default::default()
        };
        let source = WebhookSource::bind_to(config, "127.0.0.1:0".parse().unwrap())
            .await
            .unwrap();
        let addr = source.local_addr().unwrap();
        let (handler, lines) = collector();
        let task = tokio::spawn(Box::new(source).run(handler));

        let ack: serde_json::Value = reqwest::Client::new()
            .post(format!("http://{}/hook", addr))
            .body("line one")
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        task.abort();

        assert_eq!(ack, serde_json::json!({ "received": true }));
        assert_eq!(*lines.lock().unwrap(), vec!["line one".to_string()]);
    }

    #[test]
    fn test_resolve_port() {
        assert_eq!(resolve_port(None, 8000), 8000);
        assert_eq!(resolve_port(Some("9000"), 8000), 9000);
        assert_eq!(resolve_port(Some("0"), 8000), 8000);
        assert_eq!(resolve_port(Some("not a port"), 8000), 8000);
    }

    #[test]
    fn test_route_path_normalized() {
        let config = WebhookConfig {
            path: "minecraft/hook".to_string(),
            ..Default::default()
        };
        assert_eq!(config.route_path(), "/minecraft/hook");
        assert_eq!(WebhookConfig::default().route_path(), "/minecraft/hook");
    }

    #[test]
    fn test_setup_command_placeholders() {
        let setup = setup_command(&WebhookConfig::default(), 8000, r"\[Server thread/INFO\]:", false);
        assert_eq!(
            setup.command,
            "tail -F /PATH_TO_MINECRAFT_SERVER_INSTALL/logs/latest.log | grep -P --line-buffered \": <\" | while IFS= read -r x; do printf '%s\\n' \"$x\" | curl -X POST -d @- http://YOUR_URL:8000/minecraft/hook ; done"
        );
        assert_eq!(setup.hints.len(), 1);
        assert!(setup.hints[0].contains("YOUR_URL"));
        assert!(setup.note.is_none());
    }

    #[test]
    fn test_setup_command_configured() {
        let config = WebhookConfig {
            minecraft_install_path: Some(PathBuf::from("/srv/minecraft")),
            public_url: Some("example.com".to_string()),
            ..Default::default()
        };
        let setup = setup_command(&config, 25580, r"\[Server thread/INFO\]:", true);
        assert!(setup.hints.is_empty());
        assert!(setup.command.starts_with("tail -F /srv/minecraft/logs/latest.log"));
        assert!(setup.command.contains(r#"grep -P --line-buffered "\[Server thread/INFO\]:""#));
        assert!(setup.command.contains("http://example.com:25580/minecraft/hook"));
        assert!(setup.note.is_some());
    }

    #[test]
    fn test_setup_command_missing_url_only() {
        let config = WebhookConfig {
            minecraft_install_path: Some(PathBuf::from("/srv/minecraft")),
            ..Default::default()
        };
        let setup = setup_command(&config, 8000, "", false);
        assert_eq!(setup.hints.len(), 1);
        assert!(setup.hints[0].contains("YOUR_URL"));
        assert!(!setup.hints[0].contains("PATH_TO_MINECRAFT_SERVER_INSTALL"));
    }
}
