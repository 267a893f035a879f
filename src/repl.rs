use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::Result;

/// Debug listener on a local TCP port. One connection is served at a time;
/// the only recognized command is the literal `ping`.
pub struct Repl {
    port: u16,
    handle: JoinHandle<()>,
}

impl Repl {
    pub async fn start(port: u16) -> Result<Self> {
        let listener = TcpListener::bind(("127.0.0.1", port)).await?;
        let port = listener.local_addr()?.port();
        debug!("repl initialized on port {}", port);
        let handle = tokio::spawn(serve(listener));
        Ok(Self { port, handle })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn stop(&self) {
        self.handle.abort();
    }
}

async fn serve(listener: TcpListener) {
    loop {
        let (mut stream, addr) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                warn!("repl accept failed: {}", e);
                continue;
            }
        };
        debug!("repl connected by {}", addr);

        let mut buf = [0u8; 1024];
        loop {
            let read = match stream.read(&mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(read) => read,
            };
            let line = String::from_utf8_lossy(&buf[..read]).trim().to_string();
            let response = if line == "ping" { "Pong!\n" } else { "" };
            if stream.write_all(response.as_bytes()).await.is_err() {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpStream;

    #[tokio::test]
    async fn ping_answers_pong() {
        let repl = Repl::start(0).await.unwrap();

        let mut stream = TcpStream::connect(("127.0.0.1", repl.port())).await.unwrap();
        stream.write_all(b"ping").await.unwrap();
        let mut buf = [0u8; 64];
        let read = stream.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..read], b"Pong!\n");
        drop(stream);

        // Unknown commands answer nothing, and the listener keeps serving
        // after a connection closes.
        let mut stream = TcpStream::connect(("127.0.0.1", repl.port())).await.unwrap();
        stream.write_all(b"bogus").await.unwrap();
        stream.shutdown().await.unwrap();
        let read = stream.read(&mut buf).await.unwrap();
        assert_eq!(read, 0);

        repl.stop();
    }
}
