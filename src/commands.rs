//! Slash commands
//!
//! Thin layer over the core services: checks the caller's rank, converts Discord ids
//! into [`MemberId`]s, calls one core operation and renders the result.

use crate::config::BotConfig;
use crate::duty::{DutyRecord, DutyStatus, MemberId};
use crate::error::CoreError;
use crate::leaderboard::LeaderboardEntry;
use crate::ledger::WarningRecord;
use crate::{Context, Data, ERROR_TARGET, Error};
use chrono::Utc;
use poise::CreateReply;
use poise::serenity_prelude as serenity;
use std::fmt::Write as _;
use tracing::error;

const WARNING_COLOUR: u32 = 0xFF_D7_00;
const WARNINGS_COLOUR: u32 = 0xFF_A5_00;
const SHIFT_COLOUR: u32 = 0x57_F2_87;
const LEADERBOARD_COLOUR: u32 = 0x00_FF_FF;

/// Discord's cap on an embed description, in characters
pub const EMBED_DESCRIPTION_LIMIT: usize = 4096;
/// Longest reason `/warn` accepts
pub const MAX_REASON_LENGTH: u16 = 1000;
/// Largest leaderboard `/shift leaderboard` will render
pub const MAX_LEADERBOARD_LIMIT: i64 = 25;
/// Room kept for the "…and N more" trailer
const OVERFLOW_RESERVE: usize = 32;

/// Staff capability derived from role names
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Rank {
    Low,
    High,
}

impl Rank {
    /// Highest rank granted by any of `role_names`
    #[must_use]
    pub fn from_role_names<'a>(
        role_names: impl IntoIterator<Item = &'a str>,
        config: &BotConfig,
    ) -> Option<Self> {
        let mut rank = None;
        for name in role_names {
            if name == config.high_rank_role {
                return Some(Self::High);
            }
            if name == config.low_rank_role {
                rank = Some(Self::Low);
            }
        }
        rank
    }
}

/// Reply text for a core failure
#[must_use]
pub fn failure_message(error: &CoreError) -> String {
    match error {
        CoreError::AlreadyActive => "You already have an active shift.".to_string(),
        CoreError::AlreadyOnBreak => "You are already on break.".to_string(),
        CoreError::NoActiveShift => "No active shift.".to_string(),
        CoreError::NotOnBreak => "You are not on break.".to_string(),
        CoreError::InvalidReason => "A warning needs a reason.".to_string(),
        CoreError::NoWarnings => "No warnings.".to_string(),
        CoreError::InvalidLimit(n) => format!("Leaderboard size must be at least 1, got {n}."),
        CoreError::StoreUnavailable(_) => {
            "Records are unavailable right now, try again shortly.".to_string()
        }
    }
}

/// "1h 05m" style duration for minute totals
#[must_use]
pub fn format_minutes(minutes: u64) -> String {
    if minutes < 60 {
        format!("{minutes} mins")
    } else {
        format!("{}h {:02}m", minutes / 60, minutes % 60)
    }
}

/// Join newline-terminated lines without exceeding [`EMBED_DESCRIPTION_LIMIT`]
///
/// Lines that do not fit are summarized as "…and N more". A single line longer than
/// the limit is cut short and marked with "…".
fn fit_description(lines: &[String]) -> String {
    let mut text = String::new();
    let mut used = 0;

    for (shown, line) in lines.iter().enumerate() {
        let rest = lines.len() - shown;
        let budget = if rest > 1 {
            EMBED_DESCRIPTION_LIMIT - OVERFLOW_RESERVE
        } else {
            EMBED_DESCRIPTION_LIMIT
        };
        let len = line.chars().count();
        if used + len <= budget {
            text.push_str(line);
            used += len;
            continue;
        }

        let mut hidden = rest;
        if shown == 0 {
            let cut: String = line.trim_end().chars().take(budget - 2).collect();
            text.push_str(&cut);
            text.push_str("…\n");
            hidden -= 1;
        }
        if hidden > 0 {
            let _ = writeln!(text, "…and {hidden} more");
        }
        break;
    }
    text
}

#[must_use]
pub fn render_warnings(warnings: &[WarningRecord]) -> String {
    let lines: Vec<String> = warnings
        .iter()
        .map(|warning| {
            format!(
                "• **#{}** {} (by <@{}>, <t:{}:R>)\n",
                warning.id,
                warning.reason,
                warning.moderator_id,
                warning.issued_at.timestamp()
            )
        })
        .collect();
    fit_description(&lines)
}

#[must_use]
pub fn render_leaderboard(entries: &[LeaderboardEntry]) -> String {
    let lines: Vec<String> = entries
        .iter()
        .map(|entry| {
            format!(
                "**{}.** <@{}> - {}\n",
                entry.rank,
                entry.member_id,
                format_minutes(entry.total_minutes)
            )
        })
        .collect();
    fit_description(&lines)
}

#[must_use]
pub fn render_status(record: &DutyRecord) -> String {
    let mut text = format!("Status: **{}**", record.status);
    if let Some(started) = record.shift_started_at {
        let _ = write!(text, "\nCounting since <t:{}:t>", started.timestamp());
    }
    if let Some(paused) = record.break_started_at {
        let _ = write!(text, "\nOn break since <t:{}:t>", paused.timestamp());
    }
    let _ = write!(
        text,
        "\nBanked: {}",
        format_minutes(record.accumulated_minutes)
    );
    text
}

fn member_id(user: &serenity::User) -> MemberId {
    MemberId(user.id.get())
}

async fn reply_text(ctx: Context<'_>, text: impl Into<String>) -> Result<(), Error> {
    ctx.send(CreateReply::default().content(text).ephemeral(true))
        .await?;
    Ok(())
}

async fn reply_embed(
    ctx: Context<'_>,
    title: impl Into<String>,
    description: impl Into<String>,
    colour: u32,
) -> Result<(), Error> {
    let embed = serenity::CreateEmbed::new()
        .title(title)
        .description(description)
        .colour(colour)
        .timestamp(serenity::Timestamp::now());
    ctx.send(CreateReply::default().embed(embed).ephemeral(true))
        .await?;
    Ok(())
}

/// Tell the caller why the operation failed; store outages are also logged
async fn reply_failure(ctx: Context<'_>, failure: &CoreError) -> Result<(), Error> {
    if let CoreError::StoreUnavailable(source) = failure {
        error!(
            target: ERROR_TARGET,
            command = %ctx.command().qualified_name,
            error = %source,
            "Record store unavailable"
        );
    }
    reply_text(ctx, failure_message(failure)).await
}

async fn author_rank(ctx: Context<'_>) -> Option<Rank> {
    let member = ctx.author_member().await?;
    let role_names: Vec<String> = {
        let guild = ctx.guild()?;
        member
            .roles
            .iter()
            .filter_map(|role_id| guild.roles.get(role_id))
            .map(|role| role.name.clone())
            .collect()
    };
    Rank::from_role_names(role_names.iter().map(String::as_str), &ctx.data().config)
}

/// Reply with `denial` and return false unless the caller holds at least `needed`
async fn require_rank(ctx: Context<'_>, needed: Rank, denial: &str) -> Result<bool, Error> {
    if author_rank(ctx).await.is_some_and(|rank| rank >= needed) {
        Ok(true)
    } else {
        reply_text(ctx, denial).await?;
        Ok(false)
    }
}

/// Warn a user
#[poise::command(slash_command, guild_only)]
pub async fn warn(
    ctx: Context<'_>,
    #[description = "User to warn"] user: serenity::User,
    #[description = "Reason"]
    #[max_length = 1000]
    reason: String,
) -> Result<(), Error> {
    ctx.defer_ephemeral().await?;
    if !require_rank(ctx, Rank::Low, "No permission.").await? {
        return Ok(());
    }
    if reason.chars().count() > usize::from(MAX_REASON_LENGTH) {
        return reply_text(
            ctx,
            format!("Reasons are limited to {MAX_REASON_LENGTH} characters."),
        )
        .await;
    }

    let moderator = member_id(ctx.author());
    match ctx
        .data()
        .ledger
        .issue_warning(member_id(&user), moderator, &reason, Utc::now())
        .await
    {
        Ok(warning) => {
            reply_embed(
                ctx,
                "Warning Issued",
                format!("<@{}>\nReason: {}", user.id, warning.reason),
                WARNING_COLOUR,
            )
            .await
        }
        Err(e) => reply_failure(ctx, &e).await,
    }
}

/// View warnings
#[poise::command(slash_command, guild_only)]
pub async fn warnings(
    ctx: Context<'_>,
    #[description = "User"] user: serenity::User,
) -> Result<(), Error> {
    ctx.defer_ephemeral().await?;

    match ctx.data().ledger.list_warnings(member_id(&user)).await {
        Ok(warnings) if warnings.is_empty() => reply_text(ctx, "No warnings.").await,
        Ok(warnings) => {
            reply_embed(
                ctx,
                format!("Warnings for {}", user.name),
                render_warnings(&warnings),
                WARNINGS_COLOUR,
            )
            .await
        }
        Err(e) => reply_failure(ctx, &e).await,
    }
}

/// Remove latest warning
#[poise::command(slash_command, guild_only)]
pub async fn warnremove(
    ctx: Context<'_>,
    #[description = "User"] user: serenity::User,
) -> Result<(), Error> {
    ctx.defer_ephemeral().await?;
    if !require_rank(ctx, Rank::High, "High Rank only.").await? {
        return Ok(());
    }

    match ctx.data().ledger.retract_latest(member_id(&user)).await {
        Ok(warning) => {
            reply_text(
                ctx,
                format!("Warning removed: #{} {}", warning.id, warning.reason),
            )
            .await
        }
        Err(e) => reply_failure(ctx, &e).await,
    }
}

/// Shift system
#[poise::command(
    slash_command,
    guild_only,
    subcommands("start", "end", "take_break", "resume", "status", "leaderboard", "adjust"),
    subcommand_required
)]
pub async fn shift(_ctx: Context<'_>) -> Result<(), Error> {
    Ok(())
}

/// Start your shift
#[poise::command(slash_command, guild_only)]
pub async fn start(ctx: Context<'_>) -> Result<(), Error> {
    ctx.defer_ephemeral().await?;
    match ctx
        .data()
        .duty
        .start(member_id(ctx.author()), Utc::now())
        .await
    {
        Ok(_) => reply_text(ctx, "Shift started.").await,
        Err(e) => reply_failure(ctx, &e).await,
    }
}

/// End your shift
#[poise::command(slash_command, guild_only)]
pub async fn end(ctx: Context<'_>) -> Result<(), Error> {
    ctx.defer_ephemeral().await?;
    match ctx
        .data()
        .duty
        .end(member_id(ctx.author()), Utc::now())
        .await
    {
        Ok(summary) => {
            reply_embed(
                ctx,
                "Shift Ended",
                format!(
                    "This shift: {}\nTotal: {}",
                    format_minutes(summary.elapsed_minutes),
                    format_minutes(summary.total_minutes)
                ),
                SHIFT_COLOUR,
            )
            .await
        }
        Err(e) => reply_failure(ctx, &e).await,
    }
}

/// Go on break
#[poise::command(slash_command, guild_only, rename = "break")]
pub async fn take_break(ctx: Context<'_>) -> Result<(), Error> {
    ctx.defer_ephemeral().await?;
    match ctx
        .data()
        .duty
        .take_break(member_id(ctx.author()), Utc::now())
        .await
    {
        Ok(_) => reply_text(ctx, "You are now on break.").await,
        Err(e) => reply_failure(ctx, &e).await,
    }
}

/// Resume shift
#[poise::command(slash_command, guild_only)]
pub async fn resume(ctx: Context<'_>) -> Result<(), Error> {
    ctx.defer_ephemeral().await?;
    match ctx
        .data()
        .duty
        .resume(member_id(ctx.author()), Utc::now())
        .await
    {
        Ok(_) => reply_text(ctx, "Shift resumed.").await,
        Err(e) => reply_failure(ctx, &e).await,
    }
}

/// Show your shift status
#[poise::command(slash_command, guild_only)]
pub async fn status(ctx: Context<'_>) -> Result<(), Error> {
    ctx.defer_ephemeral().await?;
    match ctx.data().duty.status(member_id(ctx.author())).await {
        Ok(record) => {
            let colour = if record.status == DutyStatus::OffDuty {
                WARNINGS_COLOUR
            } else {
                SHIFT_COLOUR
            };
            reply_embed(ctx, "Shift Status", render_status(&record), colour).await
        }
        Err(e) => reply_failure(ctx, &e).await,
    }
}

/// View leaderboard
#[poise::command(slash_command, guild_only)]
pub async fn leaderboard(
    ctx: Context<'_>,
    #[description = "Number of entries"]
    #[max = 25]
    limit: Option<i64>,
) -> Result<(), Error> {
    ctx.defer_ephemeral().await?;
    let limit = limit.map(|n| n.min(MAX_LEADERBOARD_LIMIT));
    match ctx.data().leaderboard.top(limit).await {
        Ok(entries) if entries.is_empty() => reply_text(ctx, "No data.").await,
        Ok(entries) => {
            reply_embed(
                ctx,
                "Shift Leaderboard",
                render_leaderboard(&entries),
                LEADERBOARD_COLOUR,
            )
            .await
        }
        Err(e) => reply_failure(ctx, &e).await,
    }
}

/// Adjust shift time (High Rank)
#[poise::command(slash_command, guild_only)]
pub async fn adjust(
    ctx: Context<'_>,
    #[description = "User to adjust"] user: serenity::User,
    #[description = "Minutes to add/remove"] minutes: i64,
) -> Result<(), Error> {
    ctx.defer_ephemeral().await?;
    if !require_rank(ctx, Rank::High, "High Rank only.").await? {
        return Ok(());
    }

    match ctx.data().duty.adjust(member_id(&user), minutes).await {
        Ok(total) => {
            reply_text(
                ctx,
                format!(
                    "Adjusted <@{}> by {minutes} mins. Total: {}",
                    user.id,
                    format_minutes(total)
                ),
            )
            .await
        }
        Err(e) => reply_failure(ctx, &e).await,
    }
}

/// Every top-level command the bot registers
#[must_use]
pub fn all() -> Vec<poise::Command<Data, Error>> {
    vec![warn(), warnings(), warnremove(), shift()]
}
