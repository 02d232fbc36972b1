pub mod auth;
pub mod handlers;
pub mod router;

pub use router::{AppState, admin_router};
