use serenity::all::{Context, Message};

use super::{Command, CommandFuture, CommandRegistry};
use crate::config::{GuildSettings, User};
use crate::state::SharedState;
use crate::utils::parse_user_token;

pub fn bind(registry: &mut CommandRegistry) {
    registry.bind("addcmd", 1, addcmd);
    registry.bind("updcmd", 1, updcmd);
    registry.bind("delcmd", 1, delcmd);
    registry.bind("addalias", 1, addalias);
    registry.bind("delalias", 1, delalias);
    registry.bind("permcmd", 1, permcmd);
    registry.bind("enablecmd", 1, enablecmd);
    registry.bind("disablecmd", 1, disablecmd);
    registry.bind("permuser", 1, permuser);
    registry.bind("banuser", 1, banuser);
    registry.bind("unbanuser", 1, unbanuser);
    registry.bind("whitelist", 1, whitelist);
}

fn addcmd<'a>(
    ctx: &'a Context,
    msg: &'a Message,
    tokens: &'a [String],
    state: &'a SharedState,
) -> CommandFuture<'a> {
    Box::pin(async move {
        if tokens.len() < 3 {
            msg.channel_id
                .say(&ctx.http, "Usage: addcmd <name> <response template>")
                .await?;
            return Ok(());
        }
        let name = &tokens[1];
        let template = tokens[2..].join(" ");
        let reply = {
            let mut cfg = state.config.write().await;
            if cfg.commands.data.contains_key(name) || cfg.commands.aliases.contains_key(name) {
                format!("Command '{name}' already exists")
            } else {
                cfg.commands
                    .data
                    .insert(name.clone(), Command::with_message(name, 0, &template));
                format!("Command '{name}' is added")
            }
        };
        msg.channel_id.say(&ctx.http, reply).await?;
        Ok(())
    })
}

fn updcmd<'a>(
    ctx: &'a Context,
    msg: &'a Message,
    tokens: &'a [String],
    state: &'a SharedState,
) -> CommandFuture<'a> {
    Box::pin(async move {
        if tokens.len() < 3 {
            msg.channel_id
                .say(&ctx.http, "Usage: updcmd <name> <response template>")
                .await?;
            return Ok(());
        }
        let name = &tokens[1];
        let template = tokens[2..].join(" ");
        let reply = {
            let mut cfg = state.config.write().await;
            match cfg.commands.data.get_mut(name) {
                Some(command) if command.handler.is_none() => {
                    command.message = Some(template);
                    format!("Command '{name}' is updated")
                }
                Some(_) => format!("Command '{name}' is builtin and cannot be updated"),
                None => format!("Command '{name}' does not exist"),
            }
        };
        msg.channel_id.say(&ctx.http, reply).await?;
        Ok(())
    })
}

fn delcmd<'a>(
    ctx: &'a Context,
    msg: &'a Message,
    tokens: &'a [String],
    state: &'a SharedState,
) -> CommandFuture<'a> {
    Box::pin(async move {
        if tokens.len() != 2 {
            msg.channel_id.say(&ctx.http, "Usage: delcmd <name>").await?;
            return Ok(());
        }
        let name = &tokens[1];
        let reply = {
            let mut cfg = state.config.write().await;
            match cfg.commands.data.get(name).map(|c| c.handler.is_some()) {
                Some(false) => {
                    cfg.commands.data.remove(name);
                    cfg.commands.aliases.retain(|_, target| target != name);
                    format!("Command '{name}' is deleted")
                }
                Some(true) => format!("Command '{name}' is builtin and cannot be deleted"),
                None => format!("Command '{name}' does not exist"),
            }
        };
        msg.channel_id.say(&ctx.http, reply).await?;
        Ok(())
    })
}

fn addalias<'a>(
    ctx: &'a Context,
    msg: &'a Message,
    tokens: &'a [String],
    state: &'a SharedState,
) -> CommandFuture<'a> {
    Box::pin(async move {
        if tokens.len() != 3 {
            msg.channel_id
                .say(&ctx.http, "Usage: addalias <alias> <command>")
                .await?;
            return Ok(());
        }
        let (alias, target) = (&tokens[1], &tokens[2]);
        let reply = {
            let mut cfg = state.config.write().await;
            if cfg.commands.data.contains_key(alias) || cfg.commands.aliases.contains_key(alias) {
                format!("'{alias}' already names a command or alias")
            } else if !cfg.commands.data.contains_key(target) {
                format!("Command '{target}' does not exist")
            } else {
                cfg.commands.aliases.insert(alias.clone(), target.clone());
                format!("Alias '{alias}' -> '{target}' is added")
            }
        };
        msg.channel_id.say(&ctx.http, reply).await?;
        Ok(())
    })
}

fn delalias<'a>(
    ctx: &'a Context,
    msg: &'a Message,
    tokens: &'a [String],
    state: &'a SharedState,
) -> CommandFuture<'a> {
    Box::pin(async move {
        if tokens.len() != 2 {
            msg.channel_id
                .say(&ctx.http, "Usage: delalias <alias>")
                .await?;
            return Ok(());
        }
        let alias = &tokens[1];
        let reply = {
            let mut cfg = state.config.write().await;
            match cfg.commands.aliases.remove(alias) {
                Some(_) => format!("Alias '{alias}' is deleted"),
                None => format!("Alias '{alias}' does not exist"),
            }
        };
        msg.channel_id.say(&ctx.http, reply).await?;
        Ok(())
    })
}

fn permcmd<'a>(
    ctx: &'a Context,
    msg: &'a Message,
    tokens: &'a [String],
    state: &'a SharedState,
) -> CommandFuture<'a> {
    Box::pin(async move {
        let level = tokens.get(2).and_then(|raw| raw.parse::<i64>().ok());
        let (Some(name), Some(level)) = (tokens.get(1), level) else {
            msg.channel_id
                .say(&ctx.http, "Usage: permcmd <name> <level>")
                .await?;
            return Ok(());
        };
        let reply = {
            let mut cfg = state.config.write().await;
            let canonical = cfg.commands.resolve_name(name).map(str::to_string);
            match canonical.and_then(|c| cfg.commands.data.get_mut(&c)) {
                Some(command) => {
                    command.permission = level;
                    format!("Permission level {level} is set for command '{name}'")
                }
                None => format!("Command '{name}' does not exist"),
            }
        };
        msg.channel_id.say(&ctx.http, reply).await?;
        Ok(())
    })
}

fn enablecmd<'a>(
    ctx: &'a Context,
    msg: &'a Message,
    tokens: &'a [String],
    state: &'a SharedState,
) -> CommandFuture<'a> {
    Box::pin(async move {
        scope_command(ctx, msg, tokens, state, true).await
    })
}

fn disablecmd<'a>(
    ctx: &'a Context,
    msg: &'a Message,
    tokens: &'a [String],
    state: &'a SharedState,
) -> CommandFuture<'a> {
    Box::pin(async move {
        scope_command(ctx, msg, tokens, state, false).await
    })
}

/// Shared body of enablecmd/disablecmd: toggle the global flag or the current
/// channel's membership in the command's scope.
async fn scope_command(
    ctx: &Context,
    msg: &Message,
    tokens: &[String],
    state: &SharedState,
    enable: bool,
) -> crate::error::Result<()> {
    let verb = if enable { "enablecmd" } else { "disablecmd" };
    let global = match tokens.get(2).map(String::as_str) {
        None => false,
        Some("global") => true,
        Some(_) => {
            msg.channel_id
                .say(&ctx.http, format!("Usage: {verb} <name> [global]"))
                .await?;
            return Ok(());
        }
    };
    let Some(name) = tokens.get(1) else {
        msg.channel_id
            .say(&ctx.http, format!("Usage: {verb} <name> [global]"))
            .await?;
        return Ok(());
    };

    let channel_id = msg.channel_id.get();
    let reply = {
        let mut cfg = state.config.write().await;
        let canonical = cfg.commands.resolve_name(name).map(str::to_string);
        match canonical.and_then(|c| cfg.commands.data.get_mut(&c)) {
            Some(command) => match (global, enable) {
                (true, true) => {
                    command.is_global = true;
                    format!("Command '{name}' is now global")
                }
                (true, false) => {
                    command.is_global = false;
                    format!("Command '{name}' is now restricted to its channel list")
                }
                (false, true) => {
                    command.channels.insert(channel_id);
                    format!("Command '{name}' is enabled in this channel")
                }
                (false, false) => {
                    command.channels.remove(&channel_id);
                    format!("Command '{name}' is disabled in this channel")
                }
            },
            None => format!("Command '{name}' does not exist"),
        }
    };
    msg.channel_id.say(&ctx.http, reply).await?;
    Ok(())
}

fn permuser<'a>(
    ctx: &'a Context,
    msg: &'a Message,
    tokens: &'a [String],
    state: &'a SharedState,
) -> CommandFuture<'a> {
    Box::pin(async move {
        let user_id = tokens.get(1).and_then(|raw| parse_user_token(raw));
        let level = tokens.get(2).and_then(|raw| raw.parse::<i64>().ok());
        let (Some(user_id), Some(level)) = (user_id, level) else {
            msg.channel_id
                .say(&ctx.http, "Usage: permuser <user> <level>")
                .await?;
            return Ok(());
        };
        {
            let mut cfg = state.config.write().await;
            cfg.users
                .entry(user_id)
                .or_insert_with(|| User::new(user_id))
                .permission_level = level;
        }
        msg.channel_id
            .say(
                &ctx.http,
                format!("Permission level {level} is set for user <@{user_id}>"),
            )
            .await?;
        Ok(())
    })
}

fn banuser<'a>(
    ctx: &'a Context,
    msg: &'a Message,
    tokens: &'a [String],
    state: &'a SharedState,
) -> CommandFuture<'a> {
    Box::pin(async move {
        set_user_level(ctx, msg, tokens, state, -1, "banned from commands").await
    })
}

fn unbanuser<'a>(
    ctx: &'a Context,
    msg: &'a Message,
    tokens: &'a [String],
    state: &'a SharedState,
) -> CommandFuture<'a> {
    Box::pin(async move {
        set_user_level(ctx, msg, tokens, state, 0, "unbanned").await
    })
}

async fn set_user_level(
    ctx: &Context,
    msg: &Message,
    tokens: &[String],
    state: &SharedState,
    level: i64,
    verb: &str,
) -> crate::error::Result<()> {
    let Some(user_id) = tokens.get(1).and_then(|raw| parse_user_token(raw)) else {
        msg.channel_id
            .say(&ctx.http, "Usage: banuser/unbanuser <user>")
            .await?;
        return Ok(());
    };
    {
        let mut cfg = state.config.write().await;
        cfg.users
            .entry(user_id)
            .or_insert_with(|| User::new(user_id))
            .permission_level = level;
    }
    msg.channel_id
        .say(&ctx.http, format!("User <@{user_id}> is {verb}"))
        .await?;
    Ok(())
}

fn whitelist<'a>(
    ctx: &'a Context,
    msg: &'a Message,
    tokens: &'a [String],
    state: &'a SharedState,
) -> CommandFuture<'a> {
    Box::pin(async move {
        let Some(guild_id) = msg.guild_id.map(|id| id.get()) else {
            msg.channel_id
                .say(&ctx.http, "This command only works in a guild")
                .await?;
            return Ok(());
        };
        let channel_id = msg.channel_id.get();
        let reply = {
            let mut cfg = state.config.write().await;
            let guild = cfg
                .guilds
                .entry(guild_id)
                .or_insert_with(|| GuildSettings::new(guild_id));
            match tokens.get(1).map(String::as_str) {
                Some("on") => {
                    guild.is_whitelisted = true;
                    "Guild whitelist is enabled".to_string()
                }
                Some("off") => {
                    guild.is_whitelisted = false;
                    "Guild whitelist is disabled".to_string()
                }
                Some("add") => {
                    guild.whitelist.insert(channel_id);
                    "This channel is added to the whitelist".to_string()
                }
                Some("remove") => {
                    guild.whitelist.remove(&channel_id);
                    "This channel is removed from the whitelist".to_string()
                }
                _ => "Usage: whitelist <on|off|add|remove>".to_string(),
            }
        };
        msg.channel_id.say(&ctx.http, reply).await?;
        Ok(())
    })
}
