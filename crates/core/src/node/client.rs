use std::sync::Arc;

use async_trait::async_trait;
use garland_rig::NodeId;
use tokio::net::TcpStream;

use crate::error::ShowError;
use crate::node::protocol::{read_frame, write_frame, Request, Response};
use crate::node::service::{LoadSummary, NodeService, PlaySummary};
use crate::script::Script;

/// The dispatcher's view of one node: push a script, trigger playback.
/// The master's own relays and the remote boxes sit behind the same trait
/// so the show loop never cares which is which.
#[async_trait]
pub trait NodeTransport: Send + Sync {
    fn node_id(&self) -> &NodeId;

    async fn load(&self, script: &Script) -> Result<LoadSummary, ShowError>;

    /// Resolves only once the node's playback has finished.
    async fn play(&self) -> Result<PlaySummary, ShowError>;
}

/// A node reached over the control protocol. One connection per request;
/// the boxes are rebooted often enough that holding sessions open buys
/// nothing.
pub struct RemoteNode {
    node_id: NodeId,
    address: String,
}

impl RemoteNode {
    pub fn new(node_id: NodeId, address: impl Into<String>) -> Self {
        RemoteNode {
            node_id,
            address: address.into(),
        }
    }

    fn failure(&self, message: impl Into<String>) -> ShowError {
        ShowError::RemoteNode {
            node: self.node_id.clone(),
            message: message.into(),
        }
    }

    async fn exchange(&self, request: &Request) -> Result<Response, ShowError> {
        let mut stream = TcpStream::connect(&self.address)
            .await
            .map_err(|e| self.failure(format!("connect {}: {}", self.address, e)))?;

        write_frame(&mut stream, request)
            .await
            .map_err(|e| self.failure(e.to_string()))?;

        match read_frame::<_, Response>(&mut stream).await {
            Ok(Some(response)) => Ok(response),
            Ok(None) => Err(self.failure("connection closed before reply")),
            Err(e) => Err(self.failure(e.to_string())),
        }
    }
}

#[async_trait]
impl NodeTransport for RemoteNode {
    fn node_id(&self) -> &NodeId {
        &self.node_id
    }

    async fn load(&self, script: &Script) -> Result<LoadSummary, ShowError> {
        let request = Request::Load {
            script: script.clone(),
        };
        match self.exchange(&request).await? {
            Response::Loaded {
                commands,
                predicted_runtime,
            } => Ok(LoadSummary {
                commands,
                predicted_runtime,
            }),
            Response::Error { message } => Err(self.failure(message)),
            other => Err(self.failure(format!("unexpected reply: {:?}", other))),
        }
    }

    async fn play(&self) -> Result<PlaySummary, ShowError> {
        match self.exchange(&Request::Play).await? {
            Response::Played { total_runtime } => Ok(PlaySummary { total_runtime }),
            Response::Error { message } => Err(self.failure(message)),
            other => Err(self.failure(format!("unexpected reply: {:?}", other))),
        }
    }
}

/// The master's own node, driven in process. Same contract as a remote
/// node minus the wire.
pub struct LocalNode {
    service: Arc<NodeService>,
}

impl LocalNode {
    pub fn new(service: Arc<NodeService>) -> Self {
        LocalNode { service }
    }
}

#[async_trait]
impl NodeTransport for LocalNode {
    fn node_id(&self) -> &NodeId {
        self.service.node_id()
    }

    async fn load(&self, script: &Script) -> Result<LoadSummary, ShowError> {
        self.service.load(script.clone())
    }

    async fn play(&self) -> Result<PlaySummary, ShowError> {
        self.service.play().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::{MemoryBus, RelayBank};
    use crate::node::server::NodeServer;
    use crate::script::Command;
    use garland_rig::{Channel, ChannelId};
    use std::collections::BTreeMap;

    fn porch_service() -> (Arc<NodeService>, MemoryBus) {
        let bus = MemoryBus::new();
        let channels: BTreeMap<ChannelId, Channel> = [(
            ChannelId::new("3"),
            Channel { pin: 4, active_low: false },
        )]
        .into_iter()
        .collect();
        let bank = RelayBank::new(channels, bus.clone());
        (
            Arc::new(NodeService::new(NodeId::new("porch"), Box::new(bank))),
            bus,
        )
    }

    fn blink() -> Script {
        let mut on = Command::new();
        on.set_channel(ChannelId::new("3"), true);
        let mut off = Command::after(0.01);
        off.set_channel(ChannelId::new("3"), false);
        Script::from_commands(vec![on, off])
    }

    #[tokio::test]
    async fn test_remote_load_and_play_against_a_live_server() {
        let (service, bus) = porch_service();

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();

        let server = NodeServer::new(Arc::clone(&service));
        let serving = tokio::spawn(async move {
            let _ = server.serve_on(listener).await;
        });

        let remote = RemoteNode::new(NodeId::new("porch"), address.to_string());

        let loaded = remote.load(&blink()).await.unwrap();
        assert_eq!(loaded.commands, 2);
        assert!((loaded.predicted_runtime - 0.01).abs() < 1e-9);

        let played = remote.play().await.unwrap();
        assert!(played.total_runtime >= 0.01);
        assert_eq!(bus.pin(4), Some(false));

        serving.abort();
    }

    #[tokio::test]
    async fn test_remote_connect_failure_names_the_node() {
        // Nothing is listening here.
        let remote = RemoteNode::new(NodeId::new("porch"), "127.0.0.1:9");
        let err = remote.play().await.unwrap_err();
        match err {
            ShowError::RemoteNode { node, .. } => assert_eq!(node, NodeId::new("porch")),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[tokio::test]
    async fn test_local_node_shares_the_service_slot() {
        let (service, bus) = porch_service();
        let local = LocalNode::new(Arc::clone(&service));

        local.load(&blink()).await.unwrap();
        local.play().await.unwrap();
        assert_eq!(bus.pin(4), Some(false));
    }
}
