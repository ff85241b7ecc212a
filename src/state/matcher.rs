// src/state/matcher.rs
//! Pure lookups over a state snapshot.

use ipnetwork::IpNetwork;
use std::collections::BTreeMap;
use std::net::IpAddr;
use crate::models::server::{PlayerServerInfo, ServerState};
use crate::models::steamid::SteamId;

/// Player search criteria. Criteria are OR'ed; unset or empty ones are
/// ignored, and a search with none set matches nobody.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOpts {
    pub name: Option<String>,
    pub steam_id: Option<SteamId>,
    pub ip: Option<IpAddr>,
    pub cidr: Option<IpNetwork>,
}

impl FindOpts {
    pub fn by_name(name: impl Into<String>) -> Self {
        Self { name: Some(name.into()), ..Default::default() }
    }

    pub fn by_steam_id(steam_id: SteamId) -> Self {
        Self { steam_id: Some(steam_id), ..Default::default() }
    }

    pub fn by_ip(ip: IpAddr) -> Self {
        Self { ip: Some(ip), ..Default::default() }
    }

    pub fn by_cidr(cidr: IpNetwork) -> Self {
        Self { cidr: Some(cidr), ..Default::default() }
    }

    /// A name made only of `*` would match every player, so it counts as
    /// unset.
    fn name(&self) -> Option<&str> {
        self.name.as_deref().filter(|n| !n.chars().all(|c| c == '*'))
    }

    fn steam_id(&self) -> Option<SteamId> {
        self.steam_id.filter(SteamId::is_valid)
    }

    pub fn is_empty(&self) -> bool {
        self.name().is_none() && self.steam_id().is_none() && self.ip.is_none() && self.cidr.is_none()
    }
}

/// `*`-only glob: a pattern without `*` must equal the subject.
pub fn glob_match(pattern: &str, subject: &str) -> bool {
    if !pattern.contains('*') {
        return pattern == subject;
    }

    let parts: Vec<&str> = pattern.split('*').collect();
    let last = parts.len() - 1;
    let mut rest = subject;

    for (i, part) in parts.iter().enumerate() {
        if i == 0 {
            match rest.strip_prefix(part) {
                Some(r) => rest = r,
                None => return false,
            }
        } else if i == last {
            return rest.ends_with(part);
        } else {
            match rest.find(part) {
                Some(idx) => rest = &rest[idx + part.len()..],
                None => return false,
            }
        }
    }
    true
}

/// Bare queries become substring matches: `abc` -> `*abc*`.
pub fn wrap_wildcards(query: &str) -> String {
    let mut wrapped = String::with_capacity(query.len() + 2);
    if !query.starts_with('*') {
        wrapped.push('*');
    }
    wrapped.push_str(query);
    if !query.ends_with('*') {
        wrapped.push('*');
    }
    wrapped
}

/// Case-insensitive wrapped glob match.
pub fn name_matches(query: &str, name: &str) -> bool {
    glob_match(&wrap_wildcards(&query.to_lowercase()), &name.to_lowercase())
}

pub fn find(snapshot: &[ServerState], opts: &FindOpts) -> Vec<PlayerServerInfo> {
    if opts.is_empty() {
        return Vec::new();
    }
    let name = opts.name();
    let steam_id = opts.steam_id();

    snapshot
        .iter()
        .flat_map(|server| server.players.iter().map(move |p| (server.server_id, p)))
        .filter(|(_, player)| {
            steam_id.map_or(false, |sid| player.steam_id == sid)
                || name.map_or(false, |n| name_matches(n, &player.name))
                || matches!((opts.ip, player.ip), (Some(want), Some(have)) if want == have)
                || matches!((opts.cidr, player.ip), (Some(net), Some(have)) if net.contains(have))
        })
        .map(|(server_id, player)| PlayerServerInfo {
            player: player.clone(),
            server_id,
        })
        .collect()
}

/// Servers whose short name matches `name`. A query made only of `*`
/// returns every server, and only when `wildcard_ok` is set.
pub fn by_name(snapshot: &[ServerState], name: &str, wildcard_ok: bool) -> Vec<ServerState> {
    if name.is_empty() {
        return Vec::new();
    }
    if name.chars().all(|c| c == '*') {
        return if wildcard_ok { snapshot.to_vec() } else { Vec::new() };
    }

    snapshot
        .iter()
        .filter(|server| name_matches(name, &server.name_short))
        .cloned()
        .collect()
}

pub fn server_ids_by_name(snapshot: &[ServerState], name: &str, wildcard_ok: bool) -> Vec<i32> {
    by_name(snapshot, name, wildcard_ok)
        .into_iter()
        .map(|s| s.server_id)
        .collect()
}

pub fn by_server_id(snapshot: &[ServerState], server_id: i32) -> Option<ServerState> {
    snapshot.iter().find(|s| s.server_id == server_id).cloned()
}

pub fn sort_region(snapshot: &[ServerState]) -> BTreeMap<String, Vec<ServerState>> {
    let mut regions: BTreeMap<String, Vec<ServerState>> = BTreeMap::new();
    for server in snapshot {
        regions.entry(server.region.clone()).or_default().push(server.clone());
    }
    regions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::server::PlayerInfo;

    fn player(id: u32, name: &str, ip: &str) -> PlayerInfo {
        PlayerInfo {
            user_id: id as i32 + 100,
            name: name.to_string(),
            steam_id: SteamId::from_account_id(id),
            connected_secs: 60,
            ping: 50,
            loss: 0,
            state: "active".to_string(),
            ip: Some(ip.parse().unwrap()),
            port: 27005,
        }
    }

    fn server(id: i32, short: &str, region: &str, players: Vec<PlayerInfo>) -> ServerState {
        ServerState {
            server_id: id,
            name_short: short.to_string(),
            name: format!("Server {}", short),
            region: region.to_string(),
            players,
            ..Default::default()
        }
    }

    fn snapshot() -> Vec<ServerState> {
        vec![
            server(1, "sea-1", "na", vec![player(1, "Alice", "10.0.0.5")]),
            server(2, "sea-2", "na", vec![player(2, "alice_2", "10.0.0.9")]),
            server(3, "fra-1", "eu", vec![player(3, "Mallory", "192.168.1.4")]),
        ]
    }

    fn found_ids(found: &[PlayerServerInfo]) -> Vec<(i32, String)> {
        found.iter().map(|f| (f.server_id, f.player.name.clone())).collect()
    }

    #[test]
    fn glob_semantics() {
        assert!(glob_match("abc", "abc"));
        assert!(!glob_match("abc", "abcd"));
        assert!(glob_match("a*", "abcd"));
        assert!(glob_match("*d", "abcd"));
        assert!(glob_match("a*c*e", "abXcYe"));
        assert!(!glob_match("a*c*e", "abXeYc"));
        assert!(glob_match("*", ""));
        assert!(!glob_match("ab*ba", "aba"));
    }

    #[test]
    fn wrapping_only_adds_missing_wildcards() {
        assert_eq!(wrap_wildcards("ali"), "*ali*");
        assert_eq!(wrap_wildcards("ali*"), "*ali*");
        assert_eq!(wrap_wildcards("*ali"), "*ali*");
        assert_eq!(wrap_wildcards("*a*"), "*a*");
    }

    #[test]
    fn name_search_is_case_insensitive_substring() {
        let found = find(&snapshot(), &FindOpts::by_name("alice"));
        assert_eq!(
            found_ids(&found),
            vec![(1, "Alice".to_string()), (2, "alice_2".to_string())]
        );
    }

    #[test]
    fn cidr_search() {
        let found = find(&snapshot(), &FindOpts::by_cidr("10.0.0.0/24".parse().unwrap()));
        assert_eq!(found.len(), 2);
    }

    #[test]
    fn steam_id_search_is_exact() {
        let found = find(&snapshot(), &FindOpts::by_steam_id(SteamId::from_account_id(1)));
        assert_eq!(found_ids(&found), vec![(1, "Alice".to_string())]);
    }

    #[test]
    fn ip_search_is_exact() {
        let found = find(&snapshot(), &FindOpts::by_ip("10.0.0.9".parse().unwrap()));
        assert_eq!(found_ids(&found), vec![(2, "alice_2".to_string())]);
    }

    #[test]
    fn criteria_are_ored() {
        let opts = FindOpts {
            name: Some("mallory".to_string()),
            steam_id: Some(SteamId::from_account_id(1)),
            ..Default::default()
        };
        assert_eq!(find(&snapshot(), &opts).len(), 2);
    }

    #[test]
    fn empty_criteria_match_nobody() {
        assert!(find(&snapshot(), &FindOpts::default()).is_empty());
        let blank = FindOpts {
            name: Some(String::new()),
            steam_id: Some(SteamId::default()),
            ..Default::default()
        };
        assert!(blank.is_empty());
        assert!(find(&snapshot(), &blank).is_empty());
    }

    #[test]
    fn bare_wildcard_name_matches_nobody() {
        assert!(find(&snapshot(), &FindOpts::by_name("*")).is_empty());
        assert!(find(&snapshot(), &FindOpts::by_name("***")).is_empty());
        assert!(FindOpts::by_name("*").is_empty());

        let with_ip = FindOpts {
            name: Some("*".to_string()),
            ip: Some("192.168.1.4".parse().unwrap()),
            ..Default::default()
        };
        assert_eq!(found_ids(&find(&snapshot(), &with_ip)), vec![(3, "Mallory".to_string())]);
        assert_eq!(find(&snapshot(), &FindOpts::by_name("a*i")).len(), 2);
    }

    #[test]
    fn wildcard_requires_opt_in() {
        assert!(by_name(&snapshot(), "*", false).is_empty());
        assert!(by_name(&snapshot(), "**", false).is_empty());
        assert_eq!(by_name(&snapshot(), "*", true).len(), 3);
        assert!(by_name(&snapshot(), "", true).is_empty());
    }

    #[test]
    fn by_name_returns_every_match() {
        assert_eq!(server_ids_by_name(&snapshot(), "sea", false), vec![1, 2]);
        assert_eq!(server_ids_by_name(&snapshot(), "FRA-1", false), vec![3]);
        assert!(server_ids_by_name(&snapshot(), "lax", false).is_empty());
    }

    #[test]
    fn lookup_by_id() {
        assert_eq!(by_server_id(&snapshot(), 3).map(|s| s.name_short), Some("fra-1".to_string()));
        assert!(by_server_id(&snapshot(), 4).is_none());
    }

    #[test]
    fn regions_keep_snapshot_order() {
        let regions = sort_region(&snapshot());
        let na: Vec<i32> = regions["na"].iter().map(|s| s.server_id).collect();
        assert_eq!(na, vec![1, 2]);
        assert_eq!(regions["eu"].len(), 1);
    }
}
