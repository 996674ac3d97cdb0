//! Client side of the wire protocol

use crate::protocol::{encode_line, Call, Request, Response};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpStream, ToSocketAddrs};

/// Client errors
#[derive(Error, Debug)]
pub enum ClientError {
    /// Connecting, reading or writing failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A line could not be encoded or decoded
    #[error("Protocol error: {0}")]
    Protocol(#[from] serde_json::Error),

    /// The host answered with an error
    #[error("{0}")]
    Remote(String),

    /// The host closed the connection before answering
    #[error("Connection closed by host")]
    ConnectionClosed,

    /// The answer does not belong to the request just sent
    #[error("Response sequence {got} does not match request {expected}")]
    SequenceMismatch {
        /// Sequence number of the request
        expected: u64,
        /// Sequence number received
        got: u64,
    },
}

/// A connection to a host
pub struct Client {
    reader: Lines<BufReader<OwnedReadHalf>>,
    writer: OwnedWriteHalf,
    next_seq: u64,
}

impl Client {
    /// Connect to the host at `addr`
    pub async fn connect(addr: impl ToSocketAddrs) -> Result<Self, ClientError> {
        let stream = TcpStream::connect(addr).await?;
        let (reader, writer) = stream.into_split();
        Ok(Self {
            reader: BufReader::new(reader).lines(),
            writer,
            next_seq: 1,
        })
    }

    /// Send `call` and wait for its status string
    pub async fn call(&mut self, call: &Call) -> Result<String, ClientError> {
        let seq = self.next_seq;
        self.next_seq += 1;

        let line = encode_line(&Request {
            seq,
            call: call.clone(),
        })?;
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.flush().await?;

        let reply = self.reader.next_line().await?.ok_or(ClientError::ConnectionClosed)?;
        let response: Response = serde_json::from_str(&reply)?;
        if response.seq != seq {
            return Err(ClientError::SequenceMismatch {
                expected: seq,
                got: response.seq,
            });
        }
        response.into_result().map_err(ClientError::Remote)
    }
}
