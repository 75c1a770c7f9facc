use bytes::{Buf, BufMut, Bytes, BytesMut};
use futures::SinkExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_stream::StreamExt;
use tokio_util::codec::{Decoder, Encoder, Framed};

use crate::lobby_errors::LobbyErr;

/// Size of the big-endian length prefix in front of every frame.
pub const FRAME_HEADER_LEN: usize = 4;
/// Upper bound for a single frame payload.
pub const MAX_FRAME_LEN: usize = 64 * 1024;
/// Payload size used when a file is streamed as a sequence of binary frames.
pub const CHUNK_SIZE: usize = 60_000;

/// Anything the lobby can speak its framed protocol over (TCP streams, in-memory duplex pipes).
pub trait LobbyStream: AsyncRead + AsyncWrite + Unpin + Send {}
impl<T: AsyncRead + AsyncWrite + Unpin + Send> LobbyStream for T {}

pub type LobbyFramed<S> = Framed<S, FrameCodec>;

/// Length-prefixed frame codec.
///
/// ```text
/// +----------------------+---------------------+
/// | length (4 bytes, BE) | payload (length)    |
/// +----------------------+---------------------+
/// ```
///
/// A declared length of zero or above [`MAX_FRAME_LEN`] is a protocol violation and
/// is reported as soon as the header is visible, without waiting for a body.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameCodec;

impl FrameCodec {
    pub fn new() -> Self {
        FrameCodec {}
    }
}

impl Decoder for FrameCodec {
    type Item = BytesMut;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < FRAME_HEADER_LEN {
            return Ok(None);
        }

        let declared_len = u32::from_be_bytes([src[0], src[1], src[2], src[3]]) as usize;
        if declared_len == 0 || declared_len > MAX_FRAME_LEN {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("invalid frame length: {}", declared_len),
            ));
        }

        let total_len = FRAME_HEADER_LEN + declared_len;
        if src.len() < total_len {
            // Frame is incomplete, make room for the rest of it
            src.reserve(total_len - src.len());
            return Ok(None);
        }

        src.advance(FRAME_HEADER_LEN);
        Ok(Some(src.split_to(declared_len)))
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(buf)? {
            Some(frame) => Ok(Some(frame)),
            None if buf.is_empty() => Ok(None),
            None => Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed in the middle of a frame",
            )),
        }
    }
}

impl Encoder<Bytes> for FrameCodec {
    type Error = io::Error;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<(), Self::Error> {
        if item.is_empty() || item.len() > MAX_FRAME_LEN {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("refusing to send frame of length {}", item.len()),
            ));
        }

        dst.reserve(FRAME_HEADER_LEN + item.len());
        dst.put_u32(item.len() as u32);
        dst.extend_from_slice(&item);
        Ok(())
    }
}

/// Receive the next frame. A closed stream is a transport error: every caller expects a frame.
pub async fn recv_frame<S: LobbyStream>(framed: &mut LobbyFramed<S>) -> Result<BytesMut, LobbyErr> {
    match framed.next().await {
        Some(Ok(frame)) => Ok(frame),
        Some(Err(err)) => Err(LobbyErr::Transport(err)),
        None => Err(LobbyErr::Transport(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "connection closed while waiting for a frame",
        ))),
    }
}

pub async fn send_frame<S: LobbyStream>(
    framed: &mut LobbyFramed<S>,
    payload: Bytes,
) -> Result<(), LobbyErr> {
    framed.send(payload).await?;
    Ok(())
}

pub async fn send_json<S: LobbyStream, T: Serialize>(
    framed: &mut LobbyFramed<S>,
    value: &T,
) -> Result<(), LobbyErr> {
    let payload = serde_json::to_vec(value)?;
    send_frame(framed, Bytes::from(payload)).await
}

pub async fn recv_json<S: LobbyStream, T: DeserializeOwned>(
    framed: &mut LobbyFramed<S>,
) -> Result<T, LobbyErr> {
    let frame = recv_frame(framed).await?;
    serde_json::from_slice(&frame)
        .map_err(|err| LobbyErr::Protocol(format!("frame is not the expected JSON: {}", err)))
}
