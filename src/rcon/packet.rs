// src/rcon/packet.rs
use byteorder::{ByteOrder, LittleEndian};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use crate::error::RconError;

pub const SERVERDATA_AUTH: i32 = 3;
pub const SERVERDATA_AUTH_RESPONSE: i32 = 2;
pub const SERVERDATA_EXECCOMMAND: i32 = 2;
pub const SERVERDATA_RESPONSE_VALUE: i32 = 0;

/// id + type + two terminating NULs.
const HEADER_SIZE: usize = 10;
pub const MAX_BODY_SIZE: usize = 4096;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub id: i32,
    pub kind: i32,
    pub body: String,
}

impl Packet {
    pub fn new(id: i32, kind: i32, body: impl Into<String>) -> Self {
        Self { id, kind, body: body.into() }
    }

    pub fn encode(&self) -> Result<Vec<u8>, RconError> {
        let body = self.body.as_bytes();
        if body.len() > MAX_BODY_SIZE {
            return Err(RconError::Protocol(format!(
                "command body too large: {} bytes (max {})",
                body.len(),
                MAX_BODY_SIZE
            )));
        }
        if body.contains(&0) {
            return Err(RconError::Protocol("command body contains NUL".to_string()));
        }

        let size = (HEADER_SIZE + body.len()) as i32;
        let mut buf = vec![0u8; 12];
        LittleEndian::write_i32(&mut buf[0..4], size);
        LittleEndian::write_i32(&mut buf[4..8], self.id);
        LittleEndian::write_i32(&mut buf[8..12], self.kind);
        buf.extend_from_slice(body);
        buf.extend_from_slice(&[0, 0]);
        Ok(buf)
    }

    /// Decode everything after the size prefix.
    pub fn decode(frame: &[u8]) -> Result<Self, RconError> {
        if frame.len() < HEADER_SIZE {
            return Err(RconError::Protocol(format!("short frame: {} bytes", frame.len())));
        }
        let id = LittleEndian::read_i32(&frame[0..4]);
        let kind = LittleEndian::read_i32(&frame[4..8]);

        let mut body = &frame[8..];
        if body.last() != Some(&0) {
            return Err(RconError::Protocol("frame is not NUL terminated".to_string()));
        }
        while let Some((&0, rest)) = body.split_last() {
            body = rest;
        }

        Ok(Self {
            id,
            kind,
            body: String::from_utf8_lossy(body).into_owned(),
        })
    }
}

pub async fn write_packet<W>(writer: &mut W, packet: &Packet) -> Result<(), RconError>
where
    W: AsyncWrite + Unpin,
{
    let buf = packet.encode()?;
    writer.write_all(&buf).await?;
    writer.flush().await?;
    Ok(())
}

pub async fn read_packet<R>(reader: &mut R) -> Result<Packet, RconError>
where
    R: AsyncRead + Unpin,
{
    let mut size_buf = [0u8; 4];
    reader.read_exact(&mut size_buf).await?;
    let size = LittleEndian::read_i32(&size_buf);

    if size < HEADER_SIZE as i32 || size as usize > HEADER_SIZE + MAX_BODY_SIZE {
        return Err(RconError::Protocol(format!("invalid frame size {}", size)));
    }

    let mut frame = vec![0u8; size as usize];
    reader.read_exact(&mut frame).await?;
    Packet::decode(&frame)
}
