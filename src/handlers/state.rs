// src/handlers/state.rs
use actix_web::http::header::AUTHORIZATION;
use actix_web::{web, HttpRequest, HttpResponse};
use log::{debug, error, warn};
use crate::models::server::PartialStateUpdate;
use crate::state::StateUsecase;
use crate::utils::{peer_ip, KeyedRateLimiter, RequestError};

pub async fn get_state(usecase: web::Data<StateUsecase>) -> HttpResponse {
    let servers = usecase.current();
    debug!("Building state response with {} servers", servers.len());
    HttpResponse::Ok().json(servers)
}

pub async fn get_regions(usecase: web::Data<StateUsecase>) -> HttpResponse {
    HttpResponse::Ok().json(usecase.sort_region())
}

/// State pushed by a game server plugin, authenticated with that server's
/// RCON password.
pub async fn post_state_update(
    req: HttpRequest,
    path: web::Path<i32>,
    update: web::Json<PartialStateUpdate>,
    usecase: web::Data<StateUsecase>,
    rate_limiter: web::Data<KeyedRateLimiter>,
) -> Result<HttpResponse, RequestError> {
    let peer_ip = peer_ip(&req)?;

    if rate_limiter.check_key(&peer_ip).is_err() {
        error!("Rate limit exceeded for state update for ip: {}", peer_ip);
        return Err(RequestError::RateLimitExceeded);
    }

    let server_id = path.into_inner();
    let config = usecase
        .server_config(server_id)
        .ok_or(RequestError::UnknownServer(server_id))?;

    let credential = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(RequestError::MissingAuth)?;

    if credential != config.rcon_password {
        warn!("Rejected state update for server {} from {}", server_id, peer_ip);
        return Err(RequestError::InvalidAuth);
    }

    if !usecase.update(server_id, update.into_inner()) {
        return Err(RequestError::UnknownServer(server_id));
    }

    Ok(HttpResponse::NoContent().finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RconError;
    use crate::models::server::ServerConfig;
    use crate::rcon::RemoteExec;
    use crate::storage::memory::StateStore;
    use actix_web::{http::StatusCode, test, App};
    use async_trait::async_trait;
    use governor::Quota;
    use std::collections::HashMap;
    use std::net::SocketAddr;
    use std::num::NonZeroU32;
    use std::sync::Arc;
    use std::time::Duration;

    struct NoExec;

    #[async_trait]
    impl RemoteExec for NoExec {
        async fn exec(&self, addr: &str, _: &str, _: &str, _: Duration) -> Result<String, RconError> {
            Err(RconError::Timeout(addr.to_string()))
        }
    }

    fn usecase() -> StateUsecase {
        let store = Arc::new(StateStore::new());
        store.set_configs(
            vec![ServerConfig {
                server_id: 1,
                short_name: "sea-1".to_string(),
                default_hostname: "Seattle".to_string(),
                host: "127.0.0.1".to_string(),
                port: 27015,
                rcon_password: "secret".to_string(),
                region: "na".to_string(),
                cc: "us".to_string(),
                reserved_slots: 0,
                latitude: 0.0,
                longitude: 0.0,
            }],
            &HashMap::new(),
        );
        StateUsecase::new(store, Arc::new(NoExec), Duration::from_secs(1))
    }

    fn peer() -> SocketAddr {
        "192.0.2.1:40000".parse().unwrap()
    }

    macro_rules! app {
        ($usecase:expr, $burst:expr) => {
            test::init_service(
                App::new()
                    .app_data(web::Data::new($usecase))
                    .app_data(web::Data::new(KeyedRateLimiter::keyed(Quota::per_minute(
                        NonZeroU32::new($burst).unwrap(),
                    ))))
                    .configure(crate::handlers::routes),
            )
            .await
        };
    }

    #[actix_web::test]
    async fn accepts_authenticated_update() {
        let usecase = usecase();
        let app = app!(usecase.clone(), 10);

        let req = test::TestRequest::post()
            .uri("/state/1")
            .peer_addr(peer())
            .insert_header((AUTHORIZATION, "secret"))
            .set_json(serde_json::json!({"map": "pl_upward", "player_count": 12}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);

        let state = usecase.by_server_id(1).unwrap();
        assert_eq!(state.map, "pl_upward");
        assert_eq!(state.player_count, 12);
        assert_eq!(state.region, "na");
    }

    #[actix_web::test]
    async fn rejects_bad_credentials_and_unknown_servers() {
        let app = app!(usecase(), 10);

        let wrong = test::TestRequest::post()
            .uri("/state/1")
            .peer_addr(peer())
            .insert_header((AUTHORIZATION, "nope"))
            .set_json(serde_json::json!({}))
            .to_request();
        assert_eq!(test::call_service(&app, wrong).await.status(), StatusCode::UNAUTHORIZED);

        let missing = test::TestRequest::post()
            .uri("/state/1")
            .peer_addr(peer())
            .set_json(serde_json::json!({}))
            .to_request();
        assert_eq!(test::call_service(&app, missing).await.status(), StatusCode::UNAUTHORIZED);

        let unknown = test::TestRequest::post()
            .uri("/state/77")
            .peer_addr(peer())
            .insert_header((AUTHORIZATION, "secret"))
            .set_json(serde_json::json!({}))
            .to_request();
        assert_eq!(test::call_service(&app, unknown).await.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn rate_limits_per_peer() {
        let app = app!(usecase(), 1);
        let mut statuses = Vec::new();
        for _ in 0..2 {
            let req = test::TestRequest::post()
                .uri("/state/1")
                .peer_addr(peer())
                .insert_header((AUTHORIZATION, "secret"))
                .set_json(serde_json::json!({}))
                .to_request();
            statuses.push(test::call_service(&app, req).await.status());
        }
        assert_eq!(statuses, vec![StatusCode::NO_CONTENT, StatusCode::TOO_MANY_REQUESTS]);
    }

    #[actix_web::test]
    async fn lists_state_and_regions() {
        let app = app!(usecase(), 10);

        let req = test::TestRequest::get().uri("/state").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body[0]["name_short"], "sea-1");
        assert!(body[0].get("rcon_password").is_none());

        let req = test::TestRequest::get().uri("/state/regions").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["na"][0]["server_id"], 1);
    }
}
