pub mod state;

use actix_web::web;

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/state", web::get().to(state::get_state))
        .route("/state/regions", web::get().to(state::get_regions))
        .route("/state/{server_id}", web::post().to(state::post_state_update));
}
