pub mod app;
pub mod auth;
pub mod dispatcher;
pub mod handlers;
pub mod ledger;
pub mod usage;
pub mod utils;
