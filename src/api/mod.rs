pub mod routes;

pub use routes::{router, serve, ApiState};
