use std::io::{Error as IoError, ErrorKind};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::ShowError;
use crate::script::Script;

/// Largest accepted frame. A full song's script sits in the tens of
/// kilobytes, so anything near this is garbage or abuse.
pub const MAX_FRAME_LEN: u32 = 1024 * 1024;

/// Control operations a node accepts. Framed as length-prefixed JSON:
/// a big-endian u32 byte count, then the payload.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    /// Replace the node's held script in full.
    Load { script: Script },
    /// Play the held script. The response comes back only after local
    /// playback completes, which is what lets the dispatcher treat the
    /// reply as "this node is done".
    Play,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Response {
    Loaded {
        commands: usize,
        predicted_runtime: f64,
    },
    Played {
        total_runtime: f64,
    },
    Error {
        message: String,
    },
}

/// Write one length-prefixed JSON frame.
pub async fn write_frame<W, T>(writer: &mut W, message: &T) -> Result<(), ShowError>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let payload = serde_json::to_vec(message)?;
    if payload.len() > MAX_FRAME_LEN as usize {
        return Err(ShowError::Io(IoError::new(
            ErrorKind::InvalidData,
            format!("frame of {} bytes exceeds limit", payload.len()),
        )));
    }

    writer.write_u32(payload.len() as u32).await?;
    writer.write_all(&payload).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one frame. `None` means the peer closed the connection cleanly
/// between frames.
pub async fn read_frame<R, T>(reader: &mut R) -> Result<Option<T>, ShowError>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let len = match reader.read_u32().await {
        Ok(len) => len,
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    if len > MAX_FRAME_LEN {
        return Err(ShowError::Io(IoError::new(
            ErrorKind::InvalidData,
            format!("frame of {} bytes exceeds limit", len),
        )));
    }

    let mut payload = vec![0u8; len as usize];
    reader.read_exact(&mut payload).await?;
    Ok(Some(serde_json::from_slice(&payload)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::Command;

    #[tokio::test]
    async fn test_request_round_trips_over_a_stream() {
        let (mut client, mut server) = tokio::io::duplex(64 * 1024);

        let request = Request::Load {
            script: Script::from_commands(vec![Command::after(0.5)]),
        };
        write_frame(&mut client, &request).await.unwrap();

        let received: Request = read_frame(&mut server).await.unwrap().unwrap();
        match received {
            Request::Load { script } => assert_eq!(script.len(), 1),
            other => panic!("unexpected request: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_clean_eof_reads_as_none() {
        let (client, mut server) = tokio::io::duplex(64);
        drop(client);

        let received: Option<Request> = read_frame(&mut server).await.unwrap();
        assert!(received.is_none());
    }

    #[tokio::test]
    async fn test_oversized_frame_is_refused() {
        let (mut client, mut server) = tokio::io::duplex(64);

        // Length prefix promising two gigabytes; the reader should balk
        // without trying to allocate it.
        client.write_u32(2 * 1024 * 1024 * 1024).await.unwrap();

        let err = read_frame::<_, Request>(&mut server).await.unwrap_err();
        assert!(matches!(err, ShowError::Io(_)));
    }

    #[tokio::test]
    async fn test_tagged_encoding_is_stable() {
        let (mut client, mut server) = tokio::io::duplex(64);
        write_frame(&mut client, &Request::Play).await.unwrap();

        let mut raw = vec![0u8; 17];
        server.read_exact(&mut raw).await.unwrap();
        assert_eq!(&raw[..4], &13u32.to_be_bytes()[..]);
        assert_eq!(&raw[4..], b"{\"op\":\"play\"}");
    }
}
