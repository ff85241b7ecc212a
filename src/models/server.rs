// src/models/server.rs
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use crate::models::steamid::SteamId;

/// Connection descriptor for one tracked game server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    pub server_id: i32,
    pub short_name: String,
    #[serde(default)]
    pub default_hostname: String,
    pub host: String,
    pub port: u16,
    pub rcon_password: String,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub cc: String,
    #[serde(default)]
    pub reserved_slots: i32,
    #[serde(default)]
    pub latitude: f64,
    #[serde(default)]
    pub longitude: f64,
}

impl ServerConfig {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerInfo {
    /// In-game slot id, used by `sm_kick #<userid>`.
    pub user_id: i32,
    pub name: String,
    pub steam_id: SteamId,
    pub connected_secs: u64,
    pub ping: i32,
    pub loss: i32,
    pub state: String,
    #[serde(skip_serializing, default)]
    pub ip: Option<IpAddr>,
    #[serde(skip_serializing, default)]
    pub port: u16,
}

/// Latest known runtime state of one server. Never historized.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerState {
    pub server_id: i32,
    pub name_short: String,
    pub name: String,
    pub host: String,
    pub ip: String,
    pub port: u16,
    pub region: String,
    pub cc: String,
    pub latitude: f64,
    pub longitude: f64,
    pub reserved_slots: i32,
    pub map: String,
    pub player_count: i32,
    pub max_players: i32,
    pub bots: i32,
    pub version: String,
    pub tags: Vec<String>,
    pub edicts: Vec<i32>,
    pub players: Vec<PlayerInfo>,
    /// Unix seconds of the last applied update, 0 until the first one.
    pub last_update: u64,
}

impl ServerState {
    pub fn from_config(config: &ServerConfig, ip: String) -> Self {
        Self {
            server_id: config.server_id,
            name_short: config.short_name.clone(),
            name: config.default_hostname.clone(),
            host: config.host.clone(),
            ip,
            port: config.port,
            region: config.region.clone(),
            cc: config.cc.clone(),
            latitude: config.latitude,
            longitude: config.longitude,
            reserved_slots: config.reserved_slots,
            ..Default::default()
        }
    }

    /// Refresh the fields owned by the configuration, keeping live data.
    pub fn apply_config(&mut self, config: &ServerConfig, ip: String) {
        self.name_short = config.short_name.clone();
        if self.last_update == 0 {
            self.name = config.default_hostname.clone();
        }
        self.host = config.host.clone();
        self.ip = ip;
        self.port = config.port;
        self.region = config.region.clone();
        self.cc = config.cc.clone();
        self.latitude = config.latitude;
        self.longitude = config.longitude;
        self.reserved_slots = config.reserved_slots;
    }
}

/// A player paired with the server it was found on.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerServerInfo {
    pub player: PlayerInfo,
    pub server_id: i32,
}

/// Merge-only update; `None` fields leave the current value untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PartialStateUpdate {
    pub hostname: Option<String>,
    pub short_name: Option<String>,
    pub map: Option<String>,
    pub players: Option<Vec<PlayerInfo>>,
    pub player_count: Option<i32>,
    pub max_players: Option<i32>,
    pub bots: Option<i32>,
    pub version: Option<String>,
    pub tags: Option<Vec<String>>,
    pub edicts: Option<Vec<i32>>,
}

impl PartialStateUpdate {
    pub fn apply_to(self, state: &mut ServerState) {
        if let Some(hostname) = self.hostname.filter(|h| !h.is_empty()) {
            state.name = hostname;
        }
        if let Some(short_name) = self.short_name.filter(|s| !s.is_empty()) {
            state.name_short = short_name;
        }
        if let Some(map) = self.map.filter(|m| !m.is_empty()) {
            state.map = map;
        }
        if let Some(players) = self.players {
            state.players = players;
        }
        if let Some(count) = self.player_count {
            state.player_count = count;
        }
        if let Some(max) = self.max_players {
            state.max_players = max;
        }
        if let Some(bots) = self.bots {
            state.bots = bots;
        }
        if let Some(version) = self.version {
            state.version = version;
        }
        if let Some(tags) = self.tags {
            state.tags = tags;
        }
        if let Some(edicts) = self.edicts {
            state.edicts = edicts;
        }
    }
}
