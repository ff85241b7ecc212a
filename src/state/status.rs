// src/state/status.rs
//! Parsing of the console `status` and `sv_visiblemaxplayers` replies.

use log::debug;
use std::net::SocketAddr;
use thiserror::Error;
use crate::models::server::{PartialStateUpdate, PlayerInfo};
use crate::models::steamid::SteamId;

const MAX_PLAYERS_SUPPORTED: i32 = 101;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StatusParseError {
    #[error("response is not a status reply")]
    NotStatus,
    #[error("malformed player row: {0}")]
    PlayerRow(String),
    #[error("failed to parse sv_visiblemaxplayers response")]
    MaxPlayers,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Status {
    pub hostname: String,
    pub version: String,
    pub map: String,
    pub tags: Vec<String>,
    pub edicts: Vec<i32>,
    pub humans: i32,
    pub bots: i32,
    pub max_players: i32,
    pub players: Vec<PlayerInfo>,
}

impl Status {
    /// Convert to a merge update. `max_visible` overrides the reported
    /// maximum when the server sets one.
    pub fn into_update(self, max_visible: Option<i32>) -> PartialStateUpdate {
        PartialStateUpdate {
            hostname: Some(self.hostname),
            map: Some(self.map),
            player_count: Some(self.humans),
            max_players: Some(max_visible.unwrap_or(self.max_players)),
            bots: Some(self.bots),
            version: Some(self.version),
            tags: Some(self.tags),
            edicts: Some(self.edicts),
            players: Some(self.players),
            short_name: None,
        }
    }
}

pub fn parse_status(raw: &str) -> Result<Status, StatusParseError> {
    let mut status = Status::default();
    let mut saw_hostname = false;
    let mut saw_map = false;

    for line in raw.lines() {
        let line = line.trim_end();
        if line.starts_with('#') {
            match parse_player_row(line) {
                Ok(Some(player)) => status.players.push(player),
                Ok(None) => {}
                // e.g. STEAM_ID_PENDING while a player is still connecting
                Err(e) => debug!("Skipping status row: {}", e),
            }
            continue;
        }

        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        match key.trim() {
            "hostname" => {
                status.hostname = value.to_string();
                saw_hostname = true;
            }
            "version" => {
                status.version = value.split_whitespace().next().unwrap_or_default().to_string();
            }
            "map" => {
                status.map = value.split_whitespace().next().unwrap_or_default().to_string();
                saw_map = true;
            }
            "tags" => {
                status.tags = value
                    .split(',')
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .map(str::to_string)
                    .collect();
            }
            "players" => parse_player_counts(value, &mut status),
            "edicts" => status.edicts = numbers(value),
            _ => {}
        }
    }

    if !saw_hostname || !saw_map {
        return Err(StatusParseError::NotStatus);
    }
    Ok(status)
}

/// `23 humans, 1 bots (25 max)` or the older `24 (32 max)`.
fn parse_player_counts(value: &str, status: &mut Status) {
    let (counts, max) = match value.split_once('(') {
        Some((counts, rest)) => (counts, numbers(rest).first().copied()),
        None => (value, None),
    };
    let nums = numbers(counts);
    status.humans = nums.first().copied().unwrap_or_default();
    if counts.contains("bot") {
        status.bots = nums.get(1).copied().unwrap_or_default();
    }
    status.max_players = max.unwrap_or_default();
}

fn numbers(value: &str) -> Vec<i32> {
    value
        .split(|c: char| !c.is_ascii_digit())
        .filter_map(|n| n.parse().ok())
        .collect()
}

/// `#    283 "name"  [U:1:12345]  1:05:31  61  0 active 1.2.3.4:27005`.
/// Bot rows yield `None`.
fn parse_player_row(line: &str) -> Result<Option<PlayerInfo>, StatusParseError> {
    let (Some(open), Some(close)) = (line.find('"'), line.rfind('"')) else {
        // column header row
        return Ok(None);
    };
    let bad_row = || StatusParseError::PlayerRow(line.to_string());
    if open == close {
        return Err(bad_row());
    }

    let user_id: i32 = line[1..open].trim().parse().map_err(|_| bad_row())?;
    let name = line[open + 1..close].to_string();
    let fields: Vec<&str> = line[close + 1..].split_whitespace().collect();

    match fields.first() {
        Some(&"BOT") => return Ok(None),
        None => return Err(bad_row()),
        _ => {}
    }
    if fields.len() < 5 {
        return Err(bad_row());
    }

    let steam_id: SteamId = fields[0].parse().map_err(|_| bad_row())?;
    let connected_secs = parse_duration(fields[1]).ok_or_else(bad_row)?;
    let ping = fields[2].parse().map_err(|_| bad_row())?;
    let loss = fields[3].parse().map_err(|_| bad_row())?;
    let state = fields[4].to_string();
    let addr = fields.get(5).and_then(|a| a.parse::<SocketAddr>().ok());

    Ok(Some(PlayerInfo {
        user_id,
        name,
        steam_id,
        connected_secs,
        ping,
        loss,
        state,
        ip: addr.map(|a| a.ip()),
        port: addr.map(|a| a.port()).unwrap_or_default(),
    }))
}

/// `HH:MM:SS` or `MM:SS`.
fn parse_duration(value: &str) -> Option<u64> {
    value
        .split(':')
        .try_fold((0u64, 0usize), |(acc, n), part| {
            part.parse::<u64>().ok().map(|v| (acc * 60 + v, n + 1))
        })
        .filter(|(_, n)| (2..=3).contains(n))
        .map(|(secs, _)| secs)
}

/// Returns `None` when the cvar is unset or out of the supported range.
pub fn parse_max_visible(raw: &str) -> Result<Option<i32>, StatusParseError> {
    let rest = raw
        .trim_start()
        .strip_prefix("\"sv_visiblemaxplayers\" = \"")
        .ok_or(StatusParseError::MaxPlayers)?;
    let (value, _) = rest.split_once('"').ok_or(StatusParseError::MaxPlayers)?;
    let max: i32 = value.parse().map_err(|_| StatusParseError::MaxPlayers)?;

    if !(0..=MAX_PLAYERS_SUPPORTED).contains(&max) {
        return Ok(None);
    }
    Ok(Some(max))
}
