//! TCP listener for the host
//!
//! Accepts connections on a tokio runtime and handles each one in its own
//! task. Every request line is dispatched to the [`WindowCreator`] or, for
//! `Server.Close`, answered and then handed to the [`ShutdownHook`].

use crate::gateway::WindowCreator;
use crate::protocol::{encode_line, Call, Request, Response};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::task::{JoinHandle, JoinSet};

/// Longest accepted request line in bytes, excluding the newline
pub const MAX_REQUEST_LINE: usize = 64 * 1024;

/// Called with the requested exit code after `Server.Close` is answered
pub type ShutdownHook = Arc<dyn Fn(i32) + Send + Sync>;

/// Hook that terminates the process immediately
///
/// In-flight operations are not drained.
pub fn exit_process() -> ShutdownHook {
    Arc::new(|code| {
        log::info!("Server is closing with exit code {code}");
        std::process::exit(code)
    })
}

/// Running listener
///
/// Dropping the handle stops accepting and aborts open connections.
pub struct ServerHandle {
    addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl ServerHandle {
    /// Address the listener is bound to
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Stop accepting, close open connections and wait for the listener task
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[derive(Clone)]
struct Dispatcher {
    gateway: WindowCreator,
    shutdown: ShutdownHook,
}

/// Bind `bind_addr` and start serving on the current tokio runtime
pub async fn start_server(
    bind_addr: &str,
    gateway: WindowCreator,
    shutdown: ShutdownHook,
) -> io::Result<ServerHandle> {
    let listener = TcpListener::bind(bind_addr).await?;
    let addr = listener.local_addr()?;
    log::info!("Server is listening on {addr}");

    let dispatcher = Dispatcher { gateway, shutdown };
    let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();
    let task = tokio::spawn(async move {
        let mut connections = JoinSet::new();
        loop {
            tokio::select! {
                _ = &mut shutdown_rx => break,
                Some(_) = connections.join_next(), if !connections.is_empty() => {}
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        log::debug!("Connection from {peer}");
                        connections.spawn(serve_connection(stream, peer, dispatcher.clone()));
                    }
                    Err(err) => log::warn!("Failed to accept connection: {err}"),
                },
            }
        }
        log::debug!("Listener on {addr} stopped");
    });

    Ok(ServerHandle {
        addr,
        shutdown_tx: Some(shutdown_tx),
        task: Some(task),
    })
}

enum RequestLine {
    Line(String),
    TooLong,
    Closed,
}

async fn read_request_line<R: AsyncBufRead + Unpin>(reader: &mut R, buf: &mut Vec<u8>) -> io::Result<RequestLine> {
    buf.clear();
    let limit = MAX_REQUEST_LINE as u64 + 1;
    let read = (&mut *reader).take(limit).read_until(b'\n', buf).await?;
    if read == 0 {
        return Ok(RequestLine::Closed);
    }
    if buf.last() == Some(&b'\n') {
        buf.pop();
    } else if read > MAX_REQUEST_LINE {
        return Ok(RequestLine::TooLong);
    }
    Ok(RequestLine::Line(String::from_utf8_lossy(buf).into_owned()))
}

async fn serve_connection(stream: TcpStream, peer: SocketAddr, dispatcher: Dispatcher) {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();

    loop {
        let line = match read_request_line(&mut reader, &mut buf).await {
            Ok(RequestLine::Line(line)) => line,
            Ok(RequestLine::Closed) => break,
            Ok(RequestLine::TooLong) => {
                log::warn!("Request from {peer} exceeds {MAX_REQUEST_LINE} bytes, closing connection");
                let reply = Response::error(0, format!("request line exceeds {MAX_REQUEST_LINE} bytes"));
                let _ = write_response(&mut writer, &reply).await;
                break;
            }
            Err(err) => {
                log::warn!("Read from {peer} failed: {err}");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let request = match serde_json::from_str::<Request>(&line) {
            Ok(request) => request,
            Err(err) => {
                log::warn!("Malformed request from {peer}: {err}");
                if write_response(&mut writer, &Response::error(0, format!("invalid request: {err}"))).await.is_err() {
                    break;
                }
                continue;
            }
        };

        let seq = request.seq;
        let method = request.call.method();
        let gateway = &dispatcher.gateway;
        let result = match request.call {
            Call::Shutdown(code) => {
                let reply = Response::ok(seq, "Server is closing");
                if let Err(err) = write_response(&mut writer, &reply).await {
                    log::warn!("Failed to answer {method} from {peer}: {err}");
                }
                (dispatcher.shutdown)(code);
                continue;
            }
            Call::CloseWindow(id) => gateway.close(id).await,
            Call::Solid(args) => gateway.solid(args).await,
            Call::Qr(args) => gateway.qr(args).await,
        };

        let response = match result {
            Ok(status) => Response::ok(seq, status),
            Err(err) => {
                log::warn!("{method} from {peer} failed: {err}");
                Response::error(seq, err.to_string())
            }
        };
        if let Err(err) = write_response(&mut writer, &response).await {
            log::warn!("Write to {peer} failed: {err}");
            break;
        }
    }

    log::debug!("Connection from {peer} closed");
}

async fn write_response<W: AsyncWrite + Unpin>(writer: &mut W, response: &Response) -> io::Result<()> {
    let line = encode_line(response).map_err(io::Error::other)?;
    writer.write_all(line.as_bytes()).await?;
    writer.flush().await
}
