pub mod codec;
pub mod routes;

pub use routes::{create_router, AppState};
