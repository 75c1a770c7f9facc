pub mod client;
pub mod client_connection;
pub mod config;
pub mod handler;
pub mod listener;
pub mod lobby_errors;
pub mod orchestrator;
pub mod orm;
pub mod packet;
pub mod registry;
pub mod relay;
pub mod request;
pub mod rooms;
pub mod session;
pub mod sharedstate;
pub mod store;
pub mod transfer;
pub mod utils;

#[cfg(test)]
mod test_support;
