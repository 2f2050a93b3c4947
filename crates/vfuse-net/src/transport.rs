//! Packet framing over a duplex byte stream.
//!
//! On-wire format of one packet:
//! ```text
//! [checksum: 4 bytes LE][size: 4 bytes LE][payload: `size` bytes]
//! ```
//! The payload is the wire encoding of [`Packet`]. Any malformed frame is
//! fatal for the stream; there is no attempt to resynchronise.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;
use vfuse_proto::{Body, Packet};
use vfuse_types::RequestId;

use crate::error::NetError;
use crate::message::{FrameHeader, FRAME_HEADER_SIZE};

/// Encode a packet into one complete frame (header + payload).
pub fn encode_frame(id: RequestId, body: &Body) -> Result<Vec<u8>, NetError> {
    // Packet layout is `id` then `body`; encode in place to avoid cloning the body.
    let mut payload = vfuse_serde::to_bytes(&id)?;
    vfuse_serde::WireSerialize::wire_serialize(body, &mut payload)?;
    let header = FrameHeader::for_payload(&payload)?;

    let mut frame = Vec::with_capacity(FRAME_HEADER_SIZE + payload.len());
    frame.extend_from_slice(&header.to_bytes());
    frame.extend_from_slice(&payload);
    Ok(frame)
}

/// Decode a validated payload into a packet.
pub fn decode_payload(payload: &[u8]) -> Result<Packet, NetError> {
    Ok(vfuse_serde::from_bytes::<Packet>(payload)?)
}

// ---------------------------------------------------------------------------
// PacketWriter
// ---------------------------------------------------------------------------

/// Write half of a packet stream. Shared by every caller; each frame is
/// written whole while holding the lock so frames never interleave.
pub struct PacketWriter<W> {
    inner: Mutex<W>,
}

impl<W: AsyncWrite + Unpin + Send> PacketWriter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            inner: Mutex::new(writer),
        }
    }

    pub async fn write_packet(&self, id: RequestId, body: &Body) -> Result<(), NetError> {
        let frame = encode_frame(id, body)?;
        let mut writer = self.inner.lock().await;
        writer.write_all(&frame).await?;
        writer.flush().await?;
        Ok(())
    }

    /// Shut the write direction down. Later writes fail.
    pub async fn shutdown(&self) -> Result<(), NetError> {
        self.inner.lock().await.shutdown().await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// PacketReader
// ---------------------------------------------------------------------------

/// Read half of a packet stream. Owned by exactly one task.
pub struct PacketReader<R> {
    inner: R,
}

impl<R: AsyncRead + Unpin + Send> PacketReader<R> {
    pub fn new(reader: R) -> Self {
        Self { inner: reader }
    }

    /// Wait for the next complete frame.
    ///
    /// End of stream exactly at a frame boundary is reported as
    /// [`NetError::ConnectionClosed`]; anywhere else it is an I/O error.
    pub async fn read_packet(&mut self) -> Result<(RequestId, Body), NetError> {
        let mut hdr = [0u8; FRAME_HEADER_SIZE];
        let mut filled = 0;
        while filled < FRAME_HEADER_SIZE {
            let n = self.inner.read(&mut hdr[filled..]).await?;
            if n == 0 {
                if filled == 0 {
                    return Err(NetError::ConnectionClosed);
                }
                return Err(std::io::Error::from(std::io::ErrorKind::UnexpectedEof).into());
            }
            filled += n;
        }

        let header = FrameHeader::from_bytes(&hdr);
        header.check()?;

        let mut payload = vec![0u8; header.size as usize];
        self.inner.read_exact(&mut payload).await?;
        header.validate(&payload)?;

        let packet = decode_payload(&payload)?;
        Ok((packet.id, packet.body))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use vfuse_proto::{AttrReq, AttrRsp, Attr, ReadRsp};

    use super::*;

    #[tokio::test]
    async fn test_packet_over_duplex() {
        let (a, b) = tokio::io::duplex(1024);
        let writer = PacketWriter::new(a);
        let mut reader = PacketReader::new(b);

        let body = Body::from(AttrReq {
            name: "dir/file".into(),
        });
        writer.write_packet(RequestId(5), &body).await.unwrap();

        let (id, got) = reader.read_packet().await.unwrap();
        assert_eq!(id, RequestId(5));
        assert_eq!(got, body);
    }

    #[tokio::test]
    async fn test_frame_matches_packet_encoding() {
        let body = Body::from(AttrRsp {
            err: None,
            attr: Some(Attr { size: 1, mode: 2 }),
        });
        let frame = encode_frame(RequestId(3), &body).unwrap();
        let payload = vfuse_serde::to_bytes(&Packet::new(RequestId(3), body)).unwrap();
        assert_eq!(&frame[FRAME_HEADER_SIZE..], &payload[..]);
    }

    #[tokio::test]
    async fn test_eof_at_boundary_is_closed() {
        let (a, b) = tokio::io::duplex(64);
        drop(a);
        let mut reader = PacketReader::new(b);
        assert!(matches!(
            reader.read_packet().await,
            Err(NetError::ConnectionClosed)
        ));
    }

    #[tokio::test]
    async fn test_truncated_frame_is_io_error() {
        let (mut a, b) = tokio::io::duplex(1024);
        let frame = encode_frame(RequestId(1), &Body::from(ReadRsp::default())).unwrap();
        a.write_all(&frame[..frame.len() - 1]).await.unwrap();
        drop(a);

        let mut reader = PacketReader::new(b);
        match reader.read_packet().await {
            Err(NetError::Io(e)) => assert_eq!(e.kind(), std::io::ErrorKind::UnexpectedEof),
            other => panic!("expected io error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_corrupt_payload_is_rejected() {
        let (mut a, b) = tokio::io::duplex(1024);
        let mut frame = encode_frame(RequestId(1), &Body::from(ReadRsp::default())).unwrap();
        let last = frame.len() - 1;
        frame[last] ^= 0xFF;
        a.write_all(&frame).await.unwrap();

        let mut reader = PacketReader::new(b);
        assert!(matches!(
            reader.read_packet().await,
            Err(NetError::ChecksumMismatch { .. })
        ));
    }

    #[tokio::test]
    async fn test_concurrent_writers_do_not_interleave() {
        let (a, b) = tokio::io::duplex(256);
        let writer = Arc::new(PacketWriter::new(a));

        let mut tasks = Vec::new();
        for i in 0..32u64 {
            let writer = writer.clone();
            tasks.push(tokio::spawn(async move {
                let body = Body::from(AttrReq {
                    name: "x".repeat(100 + i as usize),
                });
                writer.write_packet(RequestId(i), &body).await.unwrap();
            }));
        }

        let mut reader = PacketReader::new(b);
        let mut seen = Vec::new();
        for _ in 0..32 {
            let (id, body) = reader.read_packet().await.unwrap();
            match body {
                Body::AttrReq(req) => assert_eq!(req.name.len(), 100 + id.0 as usize),
                other => panic!("unexpected body {:?}", other),
            }
            seen.push(id.0);
        }
        for t in tasks {
            t.await.unwrap();
        }
        seen.sort_unstable();
        assert_eq!(seen, (0..32).collect::<Vec<_>>());
    }
}
