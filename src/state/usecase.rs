// src/state/usecase.rs
use ipnetwork::IpNetwork;
use log::{debug, error, info};
use std::collections::{BTreeMap, HashMap};
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use crate::error::{ExecFailures, RconError, StateError};
use crate::models::server::{PartialStateUpdate, PlayerServerInfo, ServerConfig, ServerState};
use crate::models::steamid::SteamId;
use crate::rcon::RemoteExec;
use crate::state::matcher::{self, FindOpts};
use crate::storage::memory::StateStore;

/// Entry point for querying live server state and running console
/// commands against one, many or all servers.
#[derive(Clone)]
pub struct StateUsecase {
    store: Arc<StateStore>,
    rcon: Arc<dyn RemoteExec>,
    exec_timeout: Duration,
}

impl StateUsecase {
    pub fn new(store: Arc<StateStore>, rcon: Arc<dyn RemoteExec>, exec_timeout: Duration) -> Self {
        Self {
            store,
            rcon,
            exec_timeout,
        }
    }

    pub fn store(&self) -> &Arc<StateStore> {
        &self.store
    }

    pub fn current(&self) -> Vec<ServerState> {
        self.store.current()
    }

    pub fn server_config(&self, server_id: i32) -> Option<ServerConfig> {
        self.store.config(server_id)
    }

    pub fn update(&self, server_id: i32, update: PartialStateUpdate) -> bool {
        self.store.update(server_id, update)
    }

    pub fn find(&self, opts: &FindOpts) -> Vec<PlayerServerInfo> {
        matcher::find(&self.store.current(), opts)
    }

    pub fn find_by_name(&self, name: &str) -> Vec<PlayerServerInfo> {
        self.find(&FindOpts::by_name(name))
    }

    pub fn find_by_steam_id(&self, steam_id: SteamId) -> Vec<PlayerServerInfo> {
        self.find(&FindOpts::by_steam_id(steam_id))
    }

    pub fn find_by_ip(&self, ip: IpAddr) -> Vec<PlayerServerInfo> {
        self.find(&FindOpts::by_ip(ip))
    }

    pub fn find_by_cidr(&self, cidr: IpNetwork) -> Vec<PlayerServerInfo> {
        self.find(&FindOpts::by_cidr(cidr))
    }

    pub fn sort_region(&self) -> BTreeMap<String, Vec<ServerState>> {
        matcher::sort_region(&self.store.current())
    }

    pub fn by_server_id(&self, server_id: i32) -> Option<ServerState> {
        matcher::by_server_id(&self.store.current(), server_id)
    }

    pub fn by_name(&self, name: &str, wildcard_ok: bool) -> Vec<ServerState> {
        matcher::by_name(&self.store.current(), name, wildcard_ok)
    }

    pub fn server_ids_by_name(&self, name: &str, wildcard_ok: bool) -> Vec<i32> {
        matcher::server_ids_by_name(&self.store.current(), name, wildcard_ok)
    }

    pub async fn exec_server(&self, server_id: i32, cmd: &str) -> Result<String, StateError> {
        self.exec_server_with_timeout(server_id, cmd, self.exec_timeout).await
    }

    pub(crate) async fn exec_server_with_timeout(
        &self,
        server_id: i32,
        cmd: &str,
        timeout: Duration,
    ) -> Result<String, StateError> {
        let config = self
            .store
            .config(server_id)
            .ok_or(StateError::UnknownServer(server_id))?;

        self.rcon
            .exec(&config.addr(), &config.rcon_password, cmd, timeout)
            .await
            .map_err(|source| StateError::Exec { server_id, source })
    }

    /// Run a command against an address that is not a tracked server.
    pub async fn exec_raw(&self, addr: &str, password: &str, cmd: &str) -> Result<String, RconError> {
        self.rcon.exec(addr, password, cmd, self.exec_timeout).await
    }

    /// Run `cmd` on every server in `server_ids` at once, or on every
    /// configured server when the slice is empty. Each target gets its own
    /// entry in the result, failed or not.
    pub async fn broadcast(&self, server_ids: &[i32], cmd: &str) -> HashMap<i32, Result<String, StateError>> {
        let mut targets: Vec<i32> = if server_ids.is_empty() {
            self.store.configs().iter().map(|c| c.server_id).collect()
        } else {
            server_ids.to_vec()
        };
        targets.sort_unstable();
        targets.dedup();

        let jobs: Vec<(i32, String)> = targets.into_iter().map(|id| (id, cmd.to_string())).collect();
        let mut results = HashMap::with_capacity(jobs.len());

        for (server_id, result) in self.fan_out(jobs).await {
            if let Err(e) = &result {
                error!("Failed to exec server command on server {}: {}", server_id, e);
            }
            results.insert(server_id, result);
        }
        results
    }

    /// Build a command for every player matching `opts` and run each one on
    /// the server that player is on. All matches are attempted even when
    /// some fail.
    pub async fn on_find_exec<F>(&self, opts: &FindOpts, on_found: F) -> Result<(), StateError>
    where
        F: Fn(&PlayerServerInfo) -> String,
    {
        let players = self.find(opts);
        if players.is_empty() {
            return Err(StateError::PlayerNotFound);
        }

        let jobs: Vec<(i32, String)> = players.iter().map(|p| (p.server_id, on_found(p))).collect();
        let attempted = jobs.len();

        let mut failures: Vec<StateError> = self
            .fan_out(jobs)
            .await
            .into_iter()
            .filter_map(|(_, result)| result.err())
            .collect();

        match failures.len() {
            0 => Ok(()),
            1 => Err(failures.remove(0)),
            _ => Err(StateError::ExecFailures(ExecFailures { failures, attempted })),
        }
    }

    /// One task per job, owned by a group scoped to this call. Results come
    /// back in completion order.
    async fn fan_out(&self, jobs: Vec<(i32, String)>) -> Vec<(i32, Result<String, StateError>)> {
        let mut group = JoinSet::new();
        let mut pending: HashMap<usize, i32> = HashMap::with_capacity(jobs.len());

        for (index, (server_id, cmd)) in jobs.into_iter().enumerate() {
            pending.insert(index, server_id);
            let usecase = self.clone();
            group.spawn(async move { (index, usecase.exec_server(server_id, &cmd).await) });
        }

        let mut results = Vec::with_capacity(pending.len());
        while let Some(joined) = group.join_next().await {
            match joined {
                Ok((index, result)) => {
                    if let Some(server_id) = pending.remove(&index) {
                        results.push((server_id, result));
                    }
                }
                Err(e) => error!("Command task failed: {}", e),
            }
        }

        for (_, server_id) in pending {
            results.push((server_id, Err(StateError::Incomplete(server_id))));
        }
        results
    }

    /// Kick `target` from every server it is connected to.
    pub async fn kick(&self, target: SteamId, reason: &str) -> Result<(), StateError> {
        if !target.is_valid() {
            return Err(StateError::InvalidTarget);
        }
        self.on_find_exec(&FindOpts::by_steam_id(target), |info| {
            format!("sm_kick #{} {}", info.player.user_id, reason)
        })
        .await
    }

    pub async fn kick_player_id(&self, user_id: i32, server_id: i32, reason: &str) -> Result<(), StateError> {
        self.exec_server(server_id, &format!("sm_kick #{} {}", user_id, reason))
            .await
            .map(|_| ())
    }

    /// Gag and mute `target` wherever it is connected.
    pub async fn silence(&self, target: SteamId, reason: &str) -> Result<(), StateError> {
        if !target.is_valid() {
            return Err(StateError::InvalidTarget);
        }
        self.on_find_exec(&FindOpts::by_steam_id(target), |info| {
            format!("sm_silence \"#{}\" {}", info.player.steam_id.steam2(), reason)
        })
        .await
    }

    pub async fn say(&self, server_id: i32, message: &str) -> Result<(), StateError> {
        self.exec_server(server_id, &format!("sm_say {}", message)).await.map(|_| ())
    }

    pub async fn csay(&self, server_id: i32, message: &str) -> Result<(), StateError> {
        self.exec_server(server_id, &format!("sm_csay {}", message)).await.map(|_| ())
    }

    /// Private message to `target` on whichever servers it is on.
    pub async fn psay(&self, target: SteamId, message: &str) -> Result<(), StateError> {
        if !target.is_valid() {
            return Err(StateError::InvalidTarget);
        }
        self.on_find_exec(&FindOpts::by_steam_id(target), |_| {
            format!("sm_psay \"#{}\" \"{}\"", target.steam2(), message)
        })
        .await
    }

    pub async fn log_address_add(&self, log_address: &str) -> HashMap<i32, Result<String, StateError>> {
        info!("Enabling log forwarding to {}", log_address);
        self.broadcast(&[], &format!("logaddress_add {}", log_address)).await
    }

    pub async fn log_address_del(&self, log_address: &str) -> HashMap<i32, Result<String, StateError>> {
        info!("Disabling log forwarding to {}", log_address);
        let results = self.broadcast(&[], &format!("logaddress_del {}", log_address)).await;
        debug!("logaddress_del sent to {} servers", results.len());
        results
    }
}
