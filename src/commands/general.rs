use serenity::all::{Context, Message};

use super::{CommandFuture, CommandRegistry};
use crate::state::SharedState;

pub fn bind(registry: &mut CommandRegistry) {
    registry.bind("ping", 0, ping);
    registry.bind("echo", 0, echo);
    registry.bind("help", 0, help);
    registry.bind("about", 0, about);
    registry.bind("uptime", 0, uptime);
}

fn ping<'a>(
    ctx: &'a Context,
    msg: &'a Message,
    _tokens: &'a [String],
    _state: &'a SharedState,
) -> CommandFuture<'a> {
    Box::pin(async move {
        msg.channel_id.say(&ctx.http, "Pong!").await?;
        Ok(())
    })
}

fn echo<'a>(
    ctx: &'a Context,
    msg: &'a Message,
    tokens: &'a [String],
    _state: &'a SharedState,
) -> CommandFuture<'a> {
    Box::pin(async move {
        let text = tokens[1..].join(" ");
        if text.is_empty() {
            msg.channel_id.say(&ctx.http, "Usage: echo <text>").await?;
        } else {
            msg.channel_id.say(&ctx.http, text).await?;
        }
        Ok(())
    })
}

fn help<'a>(
    ctx: &'a Context,
    msg: &'a Message,
    _tokens: &'a [String],
    state: &'a SharedState,
) -> CommandFuture<'a> {
    Box::pin(async move {
        let listing = {
            let cfg = state.config.read().await;
            let mut names: Vec<&str> = cfg.commands.data.keys().map(String::as_str).collect();
            names.sort_unstable();
            let mut listing = format!(
                "Available commands (prefix '{}'):\n{}",
                cfg.commands_prefix,
                names.join(", ")
            );
            if !cfg.commands.aliases.is_empty() {
                let mut aliases: Vec<String> = cfg
                    .commands
                    .aliases
                    .iter()
                    .map(|(alias, command)| format!("{alias} -> {command}"))
                    .collect();
                aliases.sort();
                listing.push_str(&format!("\nAliases: {}", aliases.join(", ")));
            }
            listing
        };
        msg.channel_id.say(&ctx.http, listing).await?;
        Ok(())
    })
}

fn about<'a>(
    ctx: &'a Context,
    msg: &'a Message,
    _tokens: &'a [String],
    state: &'a SharedState,
) -> CommandFuture<'a> {
    Box::pin(async move {
        let guilds = state.config.read().await.guilds.len();
        let text = format!(
            "murmur v{} — serving {} guild(s), up for {}",
            env!("CARGO_PKG_VERSION"),
            guilds,
            format_duration(state.started_at.elapsed().as_secs())
        );
        msg.channel_id.say(&ctx.http, text).await?;
        Ok(())
    })
}

fn uptime<'a>(
    ctx: &'a Context,
    msg: &'a Message,
    _tokens: &'a [String],
    state: &'a SharedState,
) -> CommandFuture<'a> {
    Box::pin(async move {
        let text = format_duration(state.started_at.elapsed().as_secs());
        msg.channel_id.say(&ctx.http, text).await?;
        Ok(())
    })
}

fn format_duration(total_secs: u64) -> String {
    let days = total_secs / 86_400;
    let hours = (total_secs % 86_400) / 3_600;
    let minutes = (total_secs % 3_600) / 60;
    let seconds = total_secs % 60;
    if days > 0 {
        format!("{days}d {hours}h {minutes}m {seconds}s")
    } else if hours > 0 {
        format!("{hours}h {minutes}m {seconds}s")
    } else if minutes > 0 {
        format!("{minutes}m {seconds}s")
    } else {
        format!("{seconds}s")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durations_render_largest_unit_first() {
        assert_eq!(format_duration(5), "5s");
        assert_eq!(format_duration(65), "1m 5s");
        assert_eq!(format_duration(3_700), "1h 1m 40s");
        assert_eq!(format_duration(90_061), "1d 1h 1m 1s");
    }
}
