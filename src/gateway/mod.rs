mod admission;
mod handlers;

pub use admission::Admission;
pub use handlers::{health, read_status, submit_write, GatewayState};

use actix_web::web;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(handlers::health))
        .route("/status/{operation_id}", web::get().to(handlers::read_status))
        .route("/{table}", web::post().to(handlers::submit_write));
}
