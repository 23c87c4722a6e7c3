//! TCP client for talking to a hostel server

use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{ReadHalf, WriteHalf};
use tokio::net::TcpStream;
use tracing::{debug, info};

use hostel_core::User;

use crate::error::{Error, Result};
use crate::frame::{read_frame, write_frame};
use crate::protocol::{Request, Response};

/// Give up on a connect attempt after this long
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// A request/response connection to the server
///
/// Requests are answered strictly in order, so `call` takes `&mut self`.
pub struct Client {
    addr: SocketAddr,
    reader: ReadHalf<TcpStream>,
    writer: WriteHalf<TcpStream>,
    user: Option<User>,
}

impl Client {
    /// Connect to a server
    pub async fn connect(addr: SocketAddr) -> Result<Self> {
        let stream = tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect(addr))
            .await
            .map_err(|_| Error::Protocol(format!("Timed out connecting to {}", addr)))??;
        stream.set_nodelay(true)?;
        let (reader, writer) = tokio::io::split(stream);
        info!(addr = %addr, "Connected");
        Ok(Self {
            addr,
            reader,
            writer,
            user: None,
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// The account this connection is logged in as
    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    /// Send one request and wait for its response
    ///
    /// An error response from the server comes back as [`Error::Remote`].
    pub async fn call(&mut self, request: Request) -> Result<Response> {
        let route = request.route();
        write_frame(&mut self.writer, &request).await?;
        let response: Response = read_frame(&mut self.reader).await?;
        debug!(route, "Response received");
        match response {
            Response::Error { kind, message } => Err(Error::Remote { kind, message }),
            other => Ok(other),
        }
    }

    pub async fn ping(&mut self) -> Result<()> {
        match self.call(Request::Ping).await? {
            Response::Pong => Ok(()),
            other => Err(unexpected(&other)),
        }
    }

    /// Log in; later calls on this connection run as the returned user
    pub async fn login(&mut self, username: &str, password: &str) -> Result<User> {
        let request = Request::Login {
            username: username.to_string(),
            password: password.to_string(),
        };
        match self.call(request).await? {
            Response::LoggedIn { user, .. } => {
                self.user = Some(user.clone());
                Ok(user)
            }
            other => Err(unexpected(&other)),
        }
    }

    pub async fn logout(&mut self) -> Result<()> {
        if self.user.is_none() {
            return Err(Error::NotLoggedIn);
        }
        match self.call(Request::Logout).await? {
            Response::LoggedOut => {
                self.user = None;
                Ok(())
            }
            other => Err(unexpected(&other)),
        }
    }
}

fn unexpected(response: &Response) -> Error {
    Error::UnexpectedResponse(format!("{:?}", response))
}
