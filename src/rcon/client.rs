// src/rcon/client.rs
use async_trait::async_trait;
use log::{debug, error};
use rand::Rng;
use std::time::Duration;
use tokio::net::TcpStream;
use crate::error::RconError;
use crate::rcon::packet::{
    read_packet, write_packet, Packet, SERVERDATA_AUTH, SERVERDATA_AUTH_RESPONSE,
    SERVERDATA_EXECCOMMAND, SERVERDATA_RESPONSE_VALUE,
};

/// Upper bound on a reassembled multi-frame response.
const MAX_RESPONSE_SIZE: usize = 1 << 20;

/// Remote command transport. One call is one self-contained exchange.
#[async_trait]
pub trait RemoteExec: Send + Sync {
    async fn exec(
        &self,
        addr: &str,
        password: &str,
        cmd: &str,
        timeout: Duration,
    ) -> Result<String, RconError>;
}

/// Source RCON over TCP. Holds no connections between calls.
#[derive(Debug, Default, Clone, Copy)]
pub struct RconClient;

impl RconClient {
    pub fn new() -> Self {
        Self
    }

    async fn session(&self, addr: &str, password: &str, cmd: &str) -> Result<String, RconError> {
        debug!("rcon {}: connecting", addr);
        let mut stream = TcpStream::connect(addr)
            .await
            .map_err(|source| RconError::Connect {
                addr: addr.to_string(),
                source,
            })?;

        let auth_id: i32 = rand::thread_rng().gen_range(1..0x3fff_ffff);

        debug!("rcon {}: authenticating", addr);
        authenticate(&mut stream, addr, password, auth_id).await?;

        debug!("rcon {}: sending command", addr);
        let response = execute(&mut stream, cmd, auth_id + 1).await?;

        debug!("rcon {}: received {} bytes", addr, response.len());
        Ok(response)
    }
}

#[async_trait]
impl RemoteExec for RconClient {
    async fn exec(
        &self,
        addr: &str,
        password: &str,
        cmd: &str,
        timeout: Duration,
    ) -> Result<String, RconError> {
        match tokio::time::timeout(timeout, self.session(addr, password, cmd)).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(RconError::Auth(target))) => {
                error!("RCON authentication failed for {}", target);
                Err(RconError::Auth(target))
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(RconError::Timeout(addr.to_string())),
        }
    }
}

async fn authenticate(
    stream: &mut TcpStream,
    addr: &str,
    password: &str,
    auth_id: i32,
) -> Result<(), RconError> {
    write_packet(stream, &Packet::new(auth_id, SERVERDATA_AUTH, password)).await?;

    loop {
        let packet = read_packet(stream).await?;
        match packet.kind {
            // Source sends an empty RESPONSE_VALUE ahead of the auth result.
            SERVERDATA_RESPONSE_VALUE => continue,
            SERVERDATA_AUTH_RESPONSE if packet.id == -1 => {
                return Err(RconError::Auth(addr.to_string()));
            }
            SERVERDATA_AUTH_RESPONSE if packet.id == auth_id => return Ok(()),
            _ => {
                return Err(RconError::Protocol(format!(
                    "unexpected auth reply id={} type={}",
                    packet.id, packet.kind
                )));
            }
        }
    }
}

/// Send `cmd` followed by an empty sentinel; the server answers in order, so
/// the echoed sentinel marks the end of a possibly split response.
async fn execute(stream: &mut TcpStream, cmd: &str, cmd_id: i32) -> Result<String, RconError> {
    let sentinel_id = cmd_id + 1;
    write_packet(stream, &Packet::new(cmd_id, SERVERDATA_EXECCOMMAND, cmd)).await?;
    write_packet(stream, &Packet::new(sentinel_id, SERVERDATA_RESPONSE_VALUE, "")).await?;

    let mut response = String::new();
    loop {
        let packet = read_packet(stream).await?;
        if packet.id == sentinel_id {
            return Ok(response);
        }
        if packet.id != cmd_id || packet.kind != SERVERDATA_RESPONSE_VALUE {
            return Err(RconError::Protocol(format!(
                "unexpected response id={} type={}",
                packet.id, packet.kind
            )));
        }
        if response.len() + packet.body.len() > MAX_RESPONSE_SIZE {
            return Err(RconError::Protocol("response too large".to_string()));
        }
        response.push_str(&packet.body);
    }
}
