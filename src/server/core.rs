use log::{error, info, warn};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::error::TransportError;
use crate::server::handler::handle_connection;
use crate::transport::ObjectDirectory;

/// Serves an object directory over TCP.
pub struct TcpHost {
    listener: TcpListener,
    directory: Arc<ObjectDirectory>,
    max_frame_length: usize,
}

impl TcpHost {
    pub async fn bind(
        socket: &str,
        directory: Arc<ObjectDirectory>,
        max_frame_length: usize,
    ) -> Result<Self, TransportError> {
        let listener = match TcpListener::bind(socket).await {
            Ok(listener) => listener,
            Err(e) => {
                error!("Failed to bind to {}: {}", socket, e);
                return Err(e.into());
            }
        };
        info!("Host for directory {} bound to {}", directory.name(), socket);

        Ok(Self {
            listener,
            directory,
            max_frame_length,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        Ok(self.listener.local_addr()?)
    }

    /// Accepts connections forever, one task per connection.
    pub async fn start(self) {
        info!(
            "Serving directory {} on {}",
            self.directory.name(),
            self.local_addr()
                .map(|addr| addr.to_string())
                .unwrap_or_else(|_| "unknown".to_string())
        );

        loop {
            match self.listener.accept().await {
                Ok((stream, addr)) => {
                    let directory = Arc::clone(&self.directory);
                    let max_frame_length = self.max_frame_length;

                    // Spawn a task for each connection so accept loop doesn't block
                    tokio::spawn(async move {
                        if let Err(e) =
                            handle_connection(stream, addr, directory, max_frame_length).await
                        {
                            warn!("Connection {} ended with error: {}", addr, e);
                        }
                    });
                }
                Err(e) => {
                    error!("Error accepting connection: {}", e);
                }
            }
        }
    }

    /// Runs the accept loop on a background task.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.start())
    }
}
