// src/storage/memory.rs
use log::{info, warn};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use crate::models::server::{PartialStateUpdate, PlayerInfo, ServerConfig, ServerState};
use crate::utils::now_secs;

/// Ids added and removed by a config reload.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ConfigChanges {
    pub added: Vec<i32>,
    pub removed: Vec<i32>,
}

/// Latest known state of every configured server plus the table of
/// connection configs. Every read hands back an owned copy.
#[derive(Debug, Default)]
pub struct StateStore {
    states: RwLock<HashMap<i32, ServerState>>,
    configs: RwLock<Vec<ServerConfig>>,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot ordered by hostname, then server id.
    pub fn current(&self) -> Vec<ServerState> {
        let mut servers: Vec<ServerState> = self.states.read().values().cloned().collect();
        servers.sort_by(|a, b| a.name.cmp(&b.name).then(a.server_id.cmp(&b.server_id)));
        servers
    }

    pub fn configs(&self) -> Vec<ServerConfig> {
        self.configs.read().clone()
    }

    pub fn config(&self, server_id: i32) -> Option<ServerConfig> {
        self.configs
            .read()
            .iter()
            .find(|c| c.server_id == server_id)
            .cloned()
    }

    /// Merge `update` into the server's state. Returns false, without
    /// touching anything, when the server is not tracked.
    pub fn update(&self, server_id: i32, mut update: PartialStateUpdate) -> bool {
        if let Some(players) = update.players.take() {
            update.players = Some(dedupe_roster(players));
        }

        let mut states = self.states.write();
        match states.get_mut(&server_id) {
            Some(state) => {
                update.apply_to(state);
                state.last_update = now_secs();
                true
            }
            None => {
                warn!("Dropping state update for unknown server {}", server_id);
                false
            }
        }
    }

    /// Replace the config table. `ips` holds pre-resolved addresses keyed by
    /// server id; servers without one fall back to their configured host.
    pub fn set_configs(&self, configs: Vec<ServerConfig>, ips: &HashMap<i32, String>) -> ConfigChanges {
        let mut seen = HashSet::new();
        let configs: Vec<ServerConfig> = configs
            .into_iter()
            .filter(|c| {
                let fresh = seen.insert(c.server_id);
                if !fresh {
                    warn!("Ignoring duplicate config for server {}", c.server_id);
                }
                fresh
            })
            .collect();

        let mut changes = ConfigChanges::default();
        let mut config_table = self.configs.write();
        let mut states = self.states.write();

        states.retain(|id, _| {
            let keep = seen.contains(id);
            if !keep {
                changes.removed.push(*id);
            }
            keep
        });

        for config in &configs {
            let ip = ips.get(&config.server_id).cloned().unwrap_or_else(|| config.host.clone());
            match states.get_mut(&config.server_id) {
                Some(state) => state.apply_config(config, ip),
                None => {
                    states.insert(config.server_id, ServerState::from_config(config, ip));
                    changes.added.push(config.server_id);
                }
            }
        }

        *config_table = configs;
        changes.added.sort_unstable();
        changes.removed.sort_unstable();

        info!(
            "Loaded {} server configs ({} added, {} removed)",
            config_table.len(),
            changes.added.len(),
            changes.removed.len()
        );
        changes
    }
}

fn dedupe_roster(players: Vec<PlayerInfo>) -> Vec<PlayerInfo> {
    let mut seen = HashSet::new();
    players
        .into_iter()
        .filter(|p| !p.steam_id.is_valid() || seen.insert(p.steam_id))
        .collect()
}
