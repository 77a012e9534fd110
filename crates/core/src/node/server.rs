use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};

use crate::error::ShowError;
use crate::node::protocol::{read_frame, write_frame, Request, Response};
use crate::node::service::NodeService;

/// Listens for dispatcher connections and runs them against one node
/// service. This is the whole of what a remote node does all season.
pub struct NodeServer {
    service: Arc<NodeService>,
}

impl NodeServer {
    pub fn new(service: Arc<NodeService>) -> Self {
        NodeServer { service }
    }

    /// Bind and accept until the process is stopped.
    pub async fn serve(&self, bind_addr: &str) -> Result<(), ShowError> {
        let listener = TcpListener::bind(bind_addr).await?;
        self.serve_on(listener).await
    }

    /// Accept loop over an already-bound listener.
    pub async fn serve_on(&self, listener: TcpListener) -> Result<(), ShowError> {
        log::info!(
            "[{}] listening on {}",
            self.service.node_id(),
            listener.local_addr()?
        );

        loop {
            let (stream, peer) = listener.accept().await?;
            log::debug!("connection from {}", peer);

            let service = Arc::clone(&self.service);
            tokio::spawn(async move {
                if let Err(err) = handle_connection(stream, service).await {
                    log::warn!("connection from {} failed: {}", peer, err);
                }
            });
        }
    }
}

/// One request/response exchange at a time until the peer hangs up.
/// Operation failures go back as error responses; only transport failures
/// tear the connection down.
async fn handle_connection(
    mut stream: TcpStream,
    service: Arc<NodeService>,
) -> Result<(), ShowError> {
    while let Some(request) = read_frame::<_, Request>(&mut stream).await? {
        let response = match request {
            Request::Load { script } => match service.load(script) {
                Ok(summary) => Response::Loaded {
                    commands: summary.commands,
                    predicted_runtime: summary.predicted_runtime,
                },
                Err(err) => Response::Error {
                    message: err.to_string(),
                },
            },
            Request::Play => match service.play().await {
                Ok(summary) => Response::Played {
                    total_runtime: summary.total_runtime,
                },
                Err(err) => Response::Error {
                    message: err.to_string(),
                },
            },
        };
        write_frame(&mut stream, &response).await?;
    }
    Ok(())
}
