pub mod auth;
pub mod clients;
pub mod peers;
pub mod status;
