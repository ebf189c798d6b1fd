//! Client library for talking to a sharevote peer

use crate::error::{Result, ShareVoteError};
use crate::protocol::{parse_response_header, Command, Response, ResponseHeader};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

/// Largest payload the client accepts from a peer
pub const MAX_PAYLOAD_LEN: usize = 64 * 1024 * 1024;

const READ_CHUNK: usize = 8 * 1024;

/// Client for connecting to a sharevote peer
pub struct Client {
    reader: BufReader<OwnedReadHalf>,
    writer: BufWriter<OwnedWriteHalf>,
}

impl Client {
    /// Connect to a peer
    pub async fn connect(addr: &str) -> Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        let (read_half, write_half) = stream.into_split();

        Ok(Self {
            reader: BufReader::new(read_half),
            writer: BufWriter::new(write_half),
        })
    }

    /// Send a command and receive a response
    pub async fn send_command(&mut self, command: &Command) -> Result<Response> {
        let command_bytes = command.to_bytes()?;

        self.writer.write_all(&command_bytes).await?;
        self.writer.flush().await?;

        self.read_response().await
    }

    async fn read_response(&mut self) -> Result<Response> {
        let mut header = String::new();
        if self.reader.read_line(&mut header).await? == 0 {
            return Err(ShareVoteError::Client("Connection closed by peer".to_string()));
        }

        match parse_response_header(header.trim_end_matches(['\r', '\n']))? {
            ResponseHeader::Ok => Ok(Response::Ok),
            ResponseHeader::Error(message) => Ok(Response::Error(message)),
            ResponseHeader::Payload(len) => {
                if len > MAX_PAYLOAD_LEN {
                    return Err(ShareVoteError::Protocol(format!(
                        "Payload of {} bytes exceeds the {} byte limit",
                        len, MAX_PAYLOAD_LEN
                    )));
                }
                // Bounded by MAX_PAYLOAD_LEN above, so this cannot overflow
                let framed = len + 2;

                // Grow with the bytes that actually arrive
                let mut body = Vec::with_capacity(framed.min(READ_CHUNK));
                (&mut self.reader)
                    .take(framed as u64)
                    .read_to_end(&mut body)
                    .await?;
                if body.len() != framed {
                    return Err(ShareVoteError::Protocol(format!(
                        "Payload truncated: expected {} bytes, got {}",
                        framed,
                        body.len()
                    )));
                }
                if !body.ends_with(b"\r\n") {
                    return Err(ShareVoteError::Protocol(
                        "Payload is not terminated by CRLF".to_string(),
                    ));
                }
                body.truncate(len);
                Ok(Response::Payload(body))
            }
        }
    }

    /// Run deployment-time `init` with the given arguments
    pub async fn init(&mut self, args: &[&str]) -> Result<()> {
        let command = Command::Init { args: owned(args) };

        match self.send_command(&command).await? {
            Response::Ok => Ok(()),
            Response::Error(e) => Err(ShareVoteError::Server(e)),
            Response::Payload(_) => Err(ShareVoteError::Protocol(
                "Unexpected payload for INIT".to_string(),
            )),
        }
    }

    /// Invoke a state-changing function; returns its payload, if any
    pub async fn invoke(&mut self, function: &str, args: &[&str]) -> Result<Option<Vec<u8>>> {
        let command = Command::Invoke {
            function: function.to_string(),
            args: owned(args),
        };
        Self::into_payload(self.send_command(&command).await?)
    }

    /// Run a read-only function; returns its payload, if any
    pub async fn query(&mut self, function: &str, args: &[&str]) -> Result<Option<Vec<u8>>> {
        let command = Command::Query {
            function: function.to_string(),
            args: owned(args),
        };
        Self::into_payload(self.send_command(&command).await?)
    }

    fn into_payload(response: Response) -> Result<Option<Vec<u8>>> {
        match response {
            Response::Ok => Ok(None),
            Response::Payload(bytes) => Ok(Some(bytes)),
            Response::Error(e) => Err(ShareVoteError::Server(e)),
        }
    }

    /// Close the connection
    pub async fn close(mut self) -> Result<()> {
        self.writer.shutdown().await?;
        Ok(())
    }
}

fn owned(args: &[&str]) -> Vec<String> {
    args.iter().map(|a| a.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    /// Accept one connection, read one line, answer with `reply`
    async fn canned_peer(reply: &'static [u8]) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let (read_half, mut write_half) = stream.into_split();
            let mut line = String::new();
            BufReader::new(read_half).read_line(&mut line).await.unwrap();
            write_half.write_all(reply).await.unwrap();
        });

        addr
    }

    #[tokio::test]
    async fn test_payload_with_newlines_is_read_exactly() {
        let addr = canned_peer(b"PAYLOAD 6\r\na\r\nb\nc\r\n").await;
        let mut client = Client::connect(&addr).await.unwrap();

        let payload = client.query("read", &["k"]).await.unwrap();
        assert_eq!(payload, Some(b"a\r\nb\nc".to_vec()));
    }

    #[tokio::test]
    async fn test_error_response_becomes_server_error() {
        let addr = canned_peer(b"ERROR Received unknown function query: nope\r\n").await;
        let mut client = Client::connect(&addr).await.unwrap();

        match client.query("nope", &[]).await {
            Err(ShareVoteError::Server(msg)) => {
                assert_eq!(msg, "Received unknown function query: nope")
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_oversized_payload_length_is_rejected() {
        let addr = canned_peer(b"PAYLOAD 18446744073709551615\r\n").await;
        let mut client = Client::connect(&addr).await.unwrap();

        let err = client.query("read", &["k"]).await.unwrap_err();
        assert!(matches!(err, ShareVoteError::Protocol(msg) if msg.contains("limit")));

        let addr = canned_peer(b"PAYLOAD 67108865\r\n").await;
        let mut client = Client::connect(&addr).await.unwrap();

        let err = client.query("read", &["k"]).await.unwrap_err();
        assert!(matches!(err, ShareVoteError::Protocol(_)));
    }

    #[tokio::test]
    async fn test_short_payload_is_reported() {
        let addr = canned_peer(b"PAYLOAD 100\r\nabc").await;
        let mut client = Client::connect(&addr).await.unwrap();

        let err = client.query("read", &["k"]).await.unwrap_err();
        assert!(matches!(err, ShareVoteError::Protocol(msg) if msg.contains("truncated")));
    }

    #[tokio::test]
    async fn test_unencodable_argument_is_rejected_locally() {
        let addr = canned_peer(b"OK\r\n").await;
        let mut client = Client::connect(&addr).await.unwrap();

        let err = client.invoke("write", &["a \"b\"", "c", "d", "e"]).await.unwrap_err();
        assert!(matches!(err, ShareVoteError::Client(_)));
    }
}
