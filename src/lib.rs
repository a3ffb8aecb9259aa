pub mod auth;
pub mod config;
pub mod constants;
pub mod domain;
pub mod events;
pub mod logging;
pub mod remote;
pub mod services;
pub mod store;
pub mod sync;
