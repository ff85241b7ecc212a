//! Shared test doubles: a scripted Source RCON server and a counting
//! transport mock.

#![allow(dead_code)]

use async_trait::async_trait;
use fleetstate::error::RconError;
use fleetstate::models::server::{PlayerInfo, ServerConfig};
use fleetstate::models::steamid::SteamId;
use fleetstate::rcon::packet::{
    read_packet, write_packet, Packet, MAX_BODY_SIZE, SERVERDATA_AUTH, SERVERDATA_AUTH_RESPONSE,
    SERVERDATA_EXECCOMMAND, SERVERDATA_RESPONSE_VALUE,
};
use fleetstate::rcon::RemoteExec;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};

pub type Responder = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// Accepts connections forever, authenticating against `password` and
/// answering each command with `respond(cmd)`, split into max-size frames.
pub async fn spawn_rcon_server(password: &str, respond: Responder) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let password = password.to_string();

    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                return;
            };
            let password = password.clone();
            let respond = respond.clone();
            tokio::spawn(async move {
                let _ = serve(stream, &password, respond).await;
            });
        }
    });

    addr
}

async fn serve(mut stream: TcpStream, password: &str, respond: Responder) -> Result<(), RconError> {
    let auth = read_packet(&mut stream).await?;
    assert_eq!(auth.kind, SERVERDATA_AUTH);
    write_packet(&mut stream, &Packet::new(auth.id, SERVERDATA_RESPONSE_VALUE, "")).await?;
    if auth.body != password {
        write_packet(&mut stream, &Packet::new(-1, SERVERDATA_AUTH_RESPONSE, "")).await?;
        return Ok(());
    }
    write_packet(&mut stream, &Packet::new(auth.id, SERVERDATA_AUTH_RESPONSE, "")).await?;

    loop {
        let packet = read_packet(&mut stream).await?;
        match packet.kind {
            SERVERDATA_EXECCOMMAND => {
                let output = respond(&packet.body);
                let bytes = output.as_bytes();
                if bytes.is_empty() {
                    write_packet(&mut stream, &Packet::new(packet.id, SERVERDATA_RESPONSE_VALUE, "")).await?;
                }
                for chunk in bytes.chunks(MAX_BODY_SIZE) {
                    let body = String::from_utf8_lossy(chunk).into_owned();
                    write_packet(&mut stream, &Packet::new(packet.id, SERVERDATA_RESPONSE_VALUE, body)).await?;
                }
            }
            _ => {
                write_packet(&mut stream, &Packet::new(packet.id, SERVERDATA_RESPONSE_VALUE, "")).await?;
            }
        }
    }
}

/// Accepts and then never answers.
pub async fn spawn_silent_server() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((stream, _)) = listener.accept().await {
            held.push(stream);
        }
    });
    addr
}

/// Transport mock. Addresses present in `responses` answer with their
/// canned text; every other address fails to connect.
#[derive(Default)]
pub struct MockExec {
    pub calls: AtomicUsize,
    pub log: Mutex<Vec<(String, String)>>,
    responses: Mutex<HashMap<String, Result<String, String>>>,
}

impl MockExec {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn respond(&self, addr: &str, body: &str) {
        self.responses.lock().insert(addr.to_string(), Ok(body.to_string()));
    }

    pub fn time_out(&self, addr: &str) {
        self.responses.lock().insert(addr.to_string(), Err(addr.to_string()));
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteExec for MockExec {
    async fn exec(&self, addr: &str, _password: &str, cmd: &str, _timeout: Duration) -> Result<String, RconError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.log.lock().push((addr.to_string(), cmd.to_string()));
        let canned = self.responses.lock().get(addr).cloned();
        match canned {
            Some(Ok(_)) if cmd == "sv_visiblemaxplayers" => {
                Ok("\"sv_visiblemaxplayers\" = \"-1\" ( def. \"-1\" )".to_string())
            }
            Some(Ok(body)) => Ok(body),
            Some(Err(target)) => Err(RconError::Timeout(target)),
            None => Err(RconError::Connect {
                addr: addr.to_string(),
                source: std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused"),
            }),
        }
    }
}

pub fn server_config(id: i32, short: &str, host: &str, port: u16, region: &str) -> ServerConfig {
    ServerConfig {
        server_id: id,
        short_name: short.to_string(),
        default_hostname: format!("Server {}", short),
        host: host.to_string(),
        port,
        rcon_password: "secret".to_string(),
        region: region.to_string(),
        cc: "us".to_string(),
        reserved_slots: 0,
        latitude: 0.0,
        longitude: 0.0,
    }
}

pub fn player(account: u32, user_id: i32, name: &str, ip: &str) -> PlayerInfo {
    PlayerInfo {
        user_id,
        name: name.to_string(),
        steam_id: SteamId::from_account_id(account),
        connected_secs: 30,
        ping: 40,
        loss: 0,
        state: "active".to_string(),
        ip: Some(ip.parse().unwrap()),
        port: 27005,
    }
}

pub const STATUS_REPLY: &str = "hostname: Test Server A
version : 8622567/24 8622567 secure
map     : cp_process_final at: 0 x, 0 y, 0 z
tags    : cp,nocrits
players : 1 humans, 0 bots (24 max)
edicts  : 900 used of 2048 max
# userid name                uniqueid            connected ping loss state  adr
#     17 \"Alice\"           [U:1:1]             10:00       35    0 active 10.0.0.5:27005
";
