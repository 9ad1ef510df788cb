use anyhow::Result;
use axum::{
    Router,
    extract::State,
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    response::IntoResponse,
    routing::get,
};
use log::{debug, info, warn};
use std::{net::SocketAddr, path::PathBuf};
use tokio::sync::broadcast;
use tower_http::services::ServeDir;

/// Websocket route browsers connect to for reload notifications
pub const LIVERELOAD_PATH: &str = "/__livereload";

const RELOAD_MESSAGE: &str = "reload";

/// Configuration for the live development server
#[derive(Debug, Clone)]
pub struct LiveServerConfig {
    /// Host to bind to
    pub host: String,
    /// Port to serve on
    pub port: u16,
    /// Root directory to serve
    pub root: PathBuf,
    /// Auto-open browser
    pub open: bool,
}

impl Default for LiveServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            root: PathBuf::from("./output"),
            open: false,
        }
    }
}

/// Tells connected browsers to reload. Cheap to clone.
#[derive(Debug, Clone)]
pub struct ReloadHandle {
    tx: broadcast::Sender<String>,
}

impl ReloadHandle {
    /// Notify every connected browser. Returns how many were listening.
    pub fn reload(&self) -> usize {
        // Sending fails only when nobody is connected.
        self.tx.send(RELOAD_MESSAGE.to_string()).unwrap_or(0)
    }

    fn subscribe(&self) -> broadcast::Receiver<String> {
        self.tx.subscribe()
    }
}

/// A static file server for the built site with live reload
pub struct LiveServer {
    config: LiveServerConfig,
    reload: ReloadHandle,
}

impl LiveServer {
    /// Create a new live server with the given configuration
    pub fn new(config: LiveServerConfig) -> Self {
        let (tx, _) = broadcast::channel::<String>(16);
        Self {
            config,
            reload: ReloadHandle { tx },
        }
    }

    /// Handle for whoever knows when the site changed (the rebuild loop).
    pub fn reload_handle(&self) -> ReloadHandle {
        self.reload.clone()
    }

    /// Run the live server
    pub async fn run(self) -> Result<()> {
        // Ensure root directory exists
        if !self.config.root.exists() {
            return Err(anyhow::anyhow!(
                "Root directory does not exist: {}",
                self.config.root.display()
            ));
        }

        // ServeDir resolves paths per request, so a rebuild that replaces
        // the whole directory is picked up without restarting.
        let serve_dir = ServeDir::new(&self.config.root);
        let app = Router::new()
            .route(LIVERELOAD_PATH, get(websocket_handler))
            .fallback_service(serve_dir)
            .with_state(self.reload.clone());

        // Build address
        let addr: SocketAddr = format!("{}:{}", self.config.host, self.config.port).parse()?;

        info!("Serving {} at http://{}", self.config.root.display(), addr);
        info!("Live reload enabled at ws://{}{}", addr, LIVERELOAD_PATH);

        // Open browser if requested
        if self.config.open {
            if let Err(e) = open::that(format!("http://{}", addr)) {
                warn!("Failed to open browser: {}", e);
            }
        }

        // Start server
        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app).await?;

        Ok(())
    }
}

async fn websocket_handler(ws: WebSocketUpgrade, State(reload): State<ReloadHandle>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| websocket_connection(socket, reload))
}

async fn websocket_connection(mut socket: WebSocket, reload: ReloadHandle) {
    let mut rx = reload.subscribe();
    debug!("Live reload client connected");

    // Send initial connection confirmation
    if socket
        .send(Message::Text("connected".to_string().into()))
        .await
        .is_err()
    {
        return;
    }

    loop {
        tokio::select! {
            msg = rx.recv() => {
                match msg {
                    Ok(reload_msg) => {
                        if socket.send(Message::Text(reload_msg.into())).await.is_err() {
                            break;
                        }
                    }
                    // Missed a few reloads while busy; one is enough.
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            msg = socket.recv() => {
                if msg.is_none() {
                    break;
                }
            }
        }
    }

    debug!("Live reload client disconnected");
}

/// Client snippet that reloads the page when the server says so. Templates
/// embed it through the `livereload` global.
pub fn livereload_script(host: &str, port: u16) -> String {
    format!(
        r#"
<script>
(function() {{
    const socket = new WebSocket('ws://{host}:{port}{path}');
    socket.onmessage = function(event) {{
        if (event.data === '{message}') {{
            location.reload();
        }}
    }};
    socket.onclose = function() {{
        console.log('Live reload disconnected');
    }};
}})();
</script>
"#,
        host = host,
        port = port,
        path = LIVERELOAD_PATH,
        message = RELOAD_MESSAGE,
    )
}
