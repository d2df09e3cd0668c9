pub mod commands;
pub mod config;
pub mod data;
pub mod duty;
pub mod error;
pub mod handlers;
pub mod leaderboard;
pub mod ledger;
pub mod logging;
pub mod store;

pub const BOT_NAME: &str = "shift_warden";
pub const COMMAND_TARGET: &str = "shift_warden::command";
pub const ERROR_TARGET: &str = "shift_warden::error";
pub const EVENT_TARGET: &str = "shift_warden::handlers";
pub const DUTY_TARGET: &str = "shift_warden::duty";
pub const LEDGER_TARGET: &str = "shift_warden::ledger";
pub const CONSOLE_TARGET: &str = "shift_warden";

pub use data::{Data, DataInner};
pub use error::{CoreError, CoreResult};
pub type Error = Box<dyn std::error::Error + Send + Sync>;
pub type Context<'a> = poise::Context<'a, Data, Error>;
