// src/state/poller.rs
use log::{debug, error, info, warn};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{watch, Notify};
use tokio::task::{AbortHandle, JoinSet};
use tokio::time::MissedTickBehavior;
use crate::error::{ProviderError, StateError};
use crate::models::server::PartialStateUpdate;
use crate::state::status::{parse_max_visible, parse_status, StatusParseError};
use crate::state::usecase::StateUsecase;
use crate::storage::memory::ConfigChanges;
use crate::storage::provider::ServerConfigProvider;

#[derive(Debug, Clone)]
pub struct PollerSettings {
    pub status_interval: Duration,
    pub reload_interval: Duration,
    pub poll_timeout: Duration,
    /// Sent as `logaddress_add` to every server after each config reload.
    pub log_address: Option<String>,
}

#[derive(Debug, thiserror::Error)]
enum PollError {
    #[error(transparent)]
    Exec(#[from] StateError),
    #[error(transparent)]
    Parse(#[from] StatusParseError),
}

/// Keeps the state store fresh: reloads server configs from the provider
/// and runs one status loop per configured server.
pub struct StatePoller {
    usecase: StateUsecase,
    provider: Arc<dyn ServerConfigProvider>,
    settings: PollerSettings,
    reload_requested: Notify,
}

impl StatePoller {
    pub fn new(usecase: StateUsecase, provider: Arc<dyn ServerConfigProvider>, settings: PollerSettings) -> Self {
        Self {
            usecase,
            provider,
            settings,
            reload_requested: Notify::new(),
        }
    }

    /// Ask a running supervisor to reload configs now, e.g. after a server
    /// was created or deleted.
    pub fn request_reload(&self) {
        self.reload_requested.notify_one();
    }

    /// Fetch configs from the provider and install them in the store. On a
    /// provider error the current configs stay in place.
    pub async fn reload_configs(&self) -> Result<ConfigChanges, ProviderError> {
        let configs = self.provider.list_servers().await?;

        let mut ips = HashMap::with_capacity(configs.len());
        for config in &configs {
            let lookup = tokio::net::lookup_host((config.host.as_str(), config.port));
            match tokio::time::timeout(self.settings.poll_timeout, lookup).await {
                Ok(Ok(mut addrs)) => {
                    if let Some(addr) = addrs.next() {
                        ips.insert(config.server_id, addr.ip().to_string());
                    }
                }
                Ok(Err(e)) => warn!("Failed to resolve server ip for {}: {}", config.host, e),
                Err(_) => warn!("Timed out resolving server ip for {}", config.host),
            }
        }

        Ok(self.usecase.store().set_configs(configs, &ips))
    }

    /// Poll every configured server once, concurrently. Returns how many
    /// polls succeeded.
    pub async fn poll_once(&self) -> usize {
        let mut group = JoinSet::new();
        for config in self.usecase.store().configs() {
            let usecase = self.usecase.clone();
            let timeout = self.settings.poll_timeout;
            group.spawn(async move { poll_server(&usecase, config.server_id, timeout).await });
        }

        let mut successful = 0;
        while let Some(joined) = group.join_next().await {
            if matches!(joined, Ok(true)) {
                successful += 1;
            }
        }
        successful
    }

    /// Supervisor loop. Runs until `shutdown` flips to true or its sender is
    /// dropped; every poll loop it started is stopped before returning.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut loops: JoinSet<()> = JoinSet::new();
        let mut handles: HashMap<i32, AbortHandle> = HashMap::new();
        let mut reload_ticker = tokio::time::interval(self.settings.reload_interval);
        reload_ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            "State poller started (status every {:?}, reload every {:?})",
            self.settings.status_interval, self.settings.reload_interval
        );

        loop {
            tokio::select! {
                _ = reload_ticker.tick() => self.reload_and_reconcile(&mut loops, &mut handles, &shutdown).await,
                _ = self.reload_requested.notified() => self.reload_and_reconcile(&mut loops, &mut handles, &shutdown).await,
                Some(joined) = loops.join_next(), if !loops.is_empty() => {
                    if let Err(e) = joined {
                        if !e.is_cancelled() {
                            error!("Poll loop ended unexpectedly: {}", e);
                        }
                    }
                }
                _ = shutdown.changed() => break,
            }
            if *shutdown.borrow() {
                break;
            }
        }

        info!("State poller stopping {} poll loops", handles.len());
        // Loops see the same shutdown signal and drop any in-flight request.
        while loops.join_next().await.is_some() {}
    }

    async fn reload_and_reconcile(
        &self,
        loops: &mut JoinSet<()>,
        handles: &mut HashMap<i32, AbortHandle>,
        shutdown: &watch::Receiver<bool>,
    ) {
        if let Err(e) = self.reload_configs().await {
            error!("Failed to fetch servers, cannot update state: {}", e);
            return;
        }

        let configured: Vec<i32> = self
            .usecase
            .store()
            .configs()
            .iter()
            .map(|c| c.server_id)
            .collect();

        handles.retain(|server_id, handle| {
            let keep = configured.contains(server_id);
            if !keep {
                debug!("Stopping poll loop for removed server {}", server_id);
                handle.abort();
            }
            keep
        });

        for server_id in configured {
            if handles.contains_key(&server_id) {
                continue;
            }
            let usecase = self.usecase.clone();
            let handle = loops.spawn(poll_loop(
                usecase,
                server_id,
                self.settings.status_interval,
                self.settings.poll_timeout,
                shutdown.clone(),
            ));
            handles.insert(server_id, handle);
        }

        if let Some(log_address) = &self.settings.log_address {
            self.usecase.log_address_add(log_address).await;
        }
    }
}

async fn poll_loop(
    usecase: StateUsecase,
    server_id: i32,
    interval: Duration,
    timeout: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown.changed() => return,
            _ = async {
                ticker.tick().await;
                poll_server(&usecase, server_id, timeout).await
            } => {}
        }
        if *shutdown.borrow() {
            return;
        }
    }
}

/// One status cycle for one server. On failure the stored state is left
/// as it was.
async fn poll_server(usecase: &StateUsecase, server_id: i32, timeout: Duration) -> bool {
    let started = Instant::now();
    match fetch_update(usecase, server_id, timeout).await {
        Ok(update) => {
            let applied = usecase.update(server_id, update);
            debug!("Polled server {} in {:?}", server_id, started.elapsed());
            applied
        }
        Err(e) => {
            warn!("Failed to poll server {}: {}", server_id, e);
            false
        }
    }
}

async fn fetch_update(
    usecase: &StateUsecase,
    server_id: i32,
    timeout: Duration,
) -> Result<PartialStateUpdate, PollError> {
    let raw_status = usecase.exec_server_with_timeout(server_id, "status", timeout).await?;
    let status = parse_status(&raw_status)?;

    let max_visible = match usecase
        .exec_server_with_timeout(server_id, "sv_visiblemaxplayers", timeout)
        .await
        .map_err(PollError::from)
        .and_then(|raw| parse_max_visible(&raw).map_err(PollError::from))
    {
        Ok(max) => max,
        Err(e) => {
            warn!("Got invalid max players value for server {}: {}", server_id, e);
            None
        }
    };

    Ok(status.into_update(max_visible))
}
