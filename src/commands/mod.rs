mod auth;
mod config_cmd;

pub use auth::{logout, status, token, LoginCommand, RegisterCommand, WhoamiCommand};
pub use config_cmd::ConfigCommand;
