//! TCP server for the hostel service
//!
//! One task per connection reads requests in order and answers each before
//! reading the next. Database work runs on the blocking pool while holding
//! the shared database lock, so writes are serialised.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::io::WriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use hostel_core::services::accounts::SESSION_HOURS;
use hostel_core::Database;

use crate::error::{Error, Result};
use crate::frame::{read_frame, write_frame};
use crate::protocol::{Request, Response};
use crate::routes::{self, Outcome, SessionChange};

/// Tunables the server needs from configuration
#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub session_hours: i64,
    pub max_connections: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            session_hours: SESSION_HOURS,
            max_connections: 256,
        }
    }
}

/// State shared across connection tasks
struct Shared {
    db: Arc<Mutex<Database>>,
    settings: ServerSettings,
    connections: AtomicUsize,
}

/// Running server handle
pub struct Server {
    addr: SocketAddr,
    shared: Arc<Shared>,
    shutdown_tx: broadcast::Sender<()>,
}

impl Server {
    /// Bind and start accepting connections
    pub async fn start(
        addr: SocketAddr,
        db: Arc<Mutex<Database>>,
        settings: ServerSettings,
    ) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        let bound_addr = listener.local_addr()?;

        info!(addr = %bound_addr, "Server started");

        let (shutdown_tx, _) = broadcast::channel(1);
        let shared = Arc::new(Shared {
            db,
            settings,
            connections: AtomicUsize::new(0),
        });

        tokio::spawn(accept_loop(
            listener,
            shared.clone(),
            shutdown_tx.clone(),
        ));

        Ok(Server {
            addr: bound_addr,
            shared,
            shutdown_tx,
        })
    }

    /// Get the server's bound address
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Number of open client connections
    pub fn connection_count(&self) -> usize {
        self.shared.connections.load(Ordering::Acquire)
    }

    /// Stop accepting and close every connection after its current request
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
        info!("Server shutdown initiated");
    }
}

/// Accept incoming connections
async fn accept_loop(
    listener: TcpListener,
    shared: Arc<Shared>,
    shutdown_tx: broadcast::Sender<()>,
) {
    let mut shutdown_rx = shutdown_tx.subscribe();
    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, addr)) => {
                        // Slot is taken here and released by the connection task
                        let open = shared.connections.fetch_add(1, Ordering::AcqRel);
                        if open >= shared.settings.max_connections {
                            shared.connections.fetch_sub(1, Ordering::AcqRel);
                            warn!(addr = %addr, "Connection limit reached, refusing");
                            continue;
                        }
                        debug!(addr = %addr, "New connection");
                        tokio::spawn(handle_connection(
                            stream,
                            addr,
                            shared.clone(),
                            shutdown_tx.subscribe(),
                        ));
                    }
                    Err(e) => {
                        error!(error = %e, "Accept failed");
                    }
                }
            }
            _ = shutdown_rx.recv() => {
                info!("Accept loop shutting down");
                break;
            }
        }
    }
}

/// Serve a single client connection until it closes
async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    shared: Arc<Shared>,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    let (mut reader, mut writer) = tokio::io::split(stream);
    let mut session: Option<String> = None;

    loop {
        tokio::select! {
            result = read_frame::<_, Request>(&mut reader) => {
                let response = match result {
                    Ok(request) => {
                        let route = request.route();
                        let outcome = dispatch(&shared, session.clone(), request).await;
                        match outcome.session {
                            SessionChange::Keep => {}
                            SessionChange::Set(token) => session = Some(token),
                            SessionChange::Clear => session = None,
                        }
                        debug!(addr = %addr, route, error = outcome.response.is_error(), "Request handled");
                        outcome.response
                    }
                    Err(Error::Malformed(e)) => {
                        debug!(addr = %addr, error = %e, "Malformed request");
                        Response::error("validation", format!("Malformed request: {}", e))
                    }
                    Err(Error::ConnectionClosed) => {
                        debug!(addr = %addr, "Connection closed");
                        break;
                    }
                    Err(e) => {
                        warn!(addr = %addr, error = %e, "Read error");
                        break;
                    }
                };
                if let Err(e) = send(&mut writer, &response).await {
                    warn!(addr = %addr, error = %e, "Write error");
                    break;
                }
            }
            _ = shutdown_rx.recv() => {
                debug!(addr = %addr, "Closing connection for shutdown");
                break;
            }
        }
    }

    shared.connections.fetch_sub(1, Ordering::AcqRel);
    info!(addr = %addr, "Client disconnected");
}

async fn send(writer: &mut WriteHalf<TcpStream>, response: &Response) -> Result<()> {
    write_frame(writer, response).await
}

/// Run a request on the blocking pool with the database locked
async fn dispatch(shared: &Arc<Shared>, token: Option<String>, request: Request) -> Outcome {
    let shared = shared.clone();
    let joined = tokio::task::spawn_blocking(move || {
        let mut db = shared.db.lock().unwrap_or_else(PoisonError::into_inner);
        routes::handle(
            &mut db,
            token.as_deref(),
            request,
            shared.settings.session_hours,
        )
    })
    .await;

    match joined {
        Ok(outcome) => outcome,
        Err(e) => {
            error!(error = %e, "Request task failed");
            Outcome {
                response: Response::error("internal", "Internal server error"),
                session: SessionChange::Keep,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::Client;
    use hostel_core::services::accounts;

    async fn start() -> Server {
        start_with(ServerSettings::default()).await
    }

    async fn start_with(settings: ServerSettings) -> Server {
        let db = Database::open_in_memory().unwrap();
        accounts::bootstrap_admin(&db, "admin", "admin-pass").unwrap();
        Server::start(
            SocketAddr::from(([127, 0, 0, 1], 0)),
            Arc::new(Mutex::new(db)),
            settings,
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_server_start() {
        let server = start().await;
        assert!(server.addr().port() > 0);
        server.shutdown();
    }

    #[tokio::test]
    async fn test_ping_and_login_over_tcp() {
        let server = start().await;
        let mut client = Client::connect(server.addr()).await.unwrap();

        client.ping().await.unwrap();
        assert!(matches!(
            client.call(Request::Dashboard).await,
            Err(Error::Remote { ref kind, .. }) if kind == "authentication"
        ));

        let user = client.login("admin", "admin-pass").await.unwrap();
        assert_eq!(user.username, "admin");
        assert!(matches!(
            client.call(Request::Dashboard).await.unwrap(),
            Response::Dashboard(_)
        ));

        client.logout().await.unwrap();
        assert!(client.call(Request::WhoAmI).await.is_err());
        server.shutdown();
    }

    #[tokio::test]
    async fn test_malformed_frame_answered_and_connection_kept() {
        use tokio::io::AsyncWriteExt;

        let server = start().await;
        let stream = TcpStream::connect(server.addr()).await.unwrap();
        let (mut reader, mut writer) = tokio::io::split(stream);

        let junk = br#"{"route":"fly_to_the_moon"}"#;
        writer.write_all(&(junk.len() as u32).to_be_bytes()).await.unwrap();
        writer.write_all(junk).await.unwrap();
        let reply: Response = read_frame(&mut reader).await.unwrap();
        assert!(matches!(reply, Response::Error { ref kind, .. } if kind == "validation"));

        write_frame(&mut writer, &Request::Ping).await.unwrap();
        let reply: Response = read_frame(&mut reader).await.unwrap();
        assert!(matches!(reply, Response::Pong));
        server.shutdown();
    }

    #[tokio::test]
    async fn test_connection_limit_holds_under_burst() {
        let server = start_with(ServerSettings {
            max_connections: 2,
            ..ServerSettings::default()
        })
        .await;

        let mut burst = Vec::new();
        for _ in 0..6 {
            burst.push(TcpStream::connect(server.addr()).await.unwrap());
        }
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        assert_eq!(server.connection_count(), 2);

        drop(burst);
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        assert_eq!(server.connection_count(), 0);

        let mut client = Client::connect(server.addr()).await.unwrap();
        client.ping().await.unwrap();
        server.shutdown();
    }
}
