pub mod principal;
pub mod request;
pub mod response;
pub mod routes;

pub use principal::Principal;
pub use routes::{create_router, AppState};
