pub mod config;
pub mod constants;
pub mod engine;
pub mod extractors;
pub mod logging;
pub mod middleware;
pub mod replay;
pub mod response;
pub mod routes;
pub mod sessions;
pub mod state;
pub mod validation;
pub mod workers;
