// Route exports
pub mod pairings;

use actix_web::web;

pub use pairings::AppState;

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .configure(pairings::configure),
    );
}
