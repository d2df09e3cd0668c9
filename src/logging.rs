use crate::{COMMAND_TARGET, CONSOLE_TARGET, Context, Data, ERROR_TARGET, Error};
use dashmap::DashMap;
use poise::FrameworkError;
use std::path::Path;
use std::sync::LazyLock;
use std::time::Instant;
use tracing::{error, info};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

/// Command log file name prefix
pub const COMMAND_LOG_FILE: &str = "commands";

/// Start times of in-flight commands, keyed by invocation id
static COMMAND_STARTS: LazyLock<DashMap<u64, Instant>> = LazyLock::new(DashMap::new);

/// Initialize the logging system with console and file outputs
///
/// # Errors
/// Returns an error if the log directory cannot be created or a subscriber is already set
pub fn init(log_dir: &Path) -> Result<(), Error> {
    if !log_dir.exists() {
        std::fs::create_dir_all(log_dir)?;
    }

    let command_file = RollingFileAppender::new(Rotation::DAILY, log_dir, COMMAND_LOG_FILE);

    // Human-readable console output
    let console_layer = fmt::layer()
        .with_span_events(FmtSpan::CLOSE)
        .with_target(true)
        .with_ansi(true);

    // JSON command log
    let command_layer = fmt::layer()
        .with_span_events(FmtSpan::CLOSE)
        .with_target(true)
        .with_ansi(false)
        .json()
        .with_writer(command_file);

    // RUST_LOG wins; otherwise info, with serenity's gateway chatter silenced
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::new("info").add_directive("serenity=error".parse()?),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(command_layer)
        .try_init()?;

    info!(log_dir = %log_dir.display(), "Logging system initialized");
    Ok(())
}

fn guild_label(ctx: Context<'_>) -> String {
    ctx.guild_id()
        .map_or_else(|| "DM".to_string(), |id| id.get().to_string())
}

fn mark_command_start(invocation: u64) {
    COMMAND_STARTS.insert(invocation, Instant::now());
}

/// Remove a command's start time, returning how long ago it was recorded
fn take_command_start(invocation: u64) -> Option<u64> {
    COMMAND_STARTS
        .remove(&invocation)
        .map(|(_, start)| u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX))
}

/// Log the start of a command execution (pre-command hook)
pub fn log_command_start(ctx: Context<'_>) {
    mark_command_start(ctx.id());

    info!(
        target: COMMAND_TARGET,
        command = %ctx.command().qualified_name,
        guild_id = %guild_label(ctx),
        user_id = %ctx.author().id.get(),
        invocation = %ctx.invocation_string(),
        event = "start",
        "Command execution started"
    );
}

/// Log the end of a command execution (post-command hook)
pub fn log_command_end(ctx: Context<'_>) {
    let duration_ms = take_command_start(ctx.id()).unwrap_or(0);

    info!(
        target: COMMAND_TARGET,
        command = %ctx.command().qualified_name,
        guild_id = %guild_label(ctx),
        user_id = %ctx.author().id.get(),
        duration_ms,
        event = "end",
        "Command execution completed"
    );
}

/// Log errors that occur during command execution
///
/// The post-command hook does not run for failed invocations, so their start time is
/// dropped here.
pub fn log_command_error(error: &FrameworkError<'_, Data, Error>) {
    if let Some(ctx) = error.ctx() {
        take_command_start(ctx.id());
    }

    match error {
        FrameworkError::Command { error, ctx, .. } => {
            error!(
                target: ERROR_TARGET,
                command = %ctx.command().qualified_name,
                guild_id = %guild_label(*ctx),
                user_id = %ctx.author().id.get(),
                error = %error,
                "Command error"
            );
        }
        FrameworkError::CommandCheckFailed { error, ctx, .. } => {
            let error_msg = error
                .as_ref()
                .map_or_else(|| "Check failed".to_string(), ToString::to_string);

            error!(
                target: ERROR_TARGET,
                command = %ctx.command().qualified_name,
                guild_id = %guild_label(*ctx),
                user_id = %ctx.author().id.get(),
                error = %error_msg,
                "Command check failed"
            );
        }
        err => {
            error!(
                target: ERROR_TARGET,
                error = ?err,
                "Other framework error"
            );
        }
    }
}

pub fn log_console(message: &str) {
    info!(
        target: CONSOLE_TARGET,
        message = %message,
        event = "console",
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_start_is_taken_once() {
        let invocation = 9_000_001;
        assert_eq!(take_command_start(invocation), None);

        mark_command_start(invocation);
        assert!(COMMAND_STARTS.contains_key(&invocation));
        assert!(take_command_start(invocation).is_some());
        assert!(!COMMAND_STARTS.contains_key(&invocation));
        assert_eq!(take_command_start(invocation), None);
    }
}
