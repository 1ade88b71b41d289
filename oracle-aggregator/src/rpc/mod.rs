pub mod activity;
pub mod server;
