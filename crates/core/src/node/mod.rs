pub mod client;
pub mod protocol;
pub mod server;
pub mod service;

pub use client::{LocalNode, NodeTransport, RemoteNode};
pub use protocol::{read_frame, write_frame, Request, Response, MAX_FRAME_LEN};
pub use server::NodeServer;
pub use service::{LoadSummary, NodeService, PlaySummary};
