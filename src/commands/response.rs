use regex_lite::Regex;
use serenity::all::{Context, Message};

use super::{CommandFuture, CommandRegistry};
use crate::config::{Reaction, Response};
use crate::state::SharedState;

pub fn bind(registry: &mut CommandRegistry) {
    registry.bind("addresponse", 1, addresponse);
    registry.bind("listresponse", 0, listresponse);
    registry.bind("delresponse", 1, delresponse);
    registry.bind("addreaction", 1, addreaction);
    registry.bind("listreaction", 0, listreaction);
    registry.bind("delreaction", 1, delreaction);
}

fn addresponse<'a>(
    ctx: &'a Context,
    msg: &'a Message,
    tokens: &'a [String],
    state: &'a SharedState,
) -> CommandFuture<'a> {
    Box::pin(async move {
        if tokens.len() < 3 {
            msg.channel_id
                .say(&ctx.http, "Usage: addresponse <regex> <text>")
                .await?;
            return Ok(());
        }
        let regex = &tokens[1];
        if Regex::new(regex).is_err() {
            msg.channel_id
                .say(&ctx.http, format!("Invalid regex: {regex}"))
                .await?;
            return Ok(());
        }
        let text = tokens[2..].join(" ");
        let id = {
            let mut cfg = state.config.write().await;
            let id = cfg.ids.next_response();
            cfg.responses.insert(
                id,
                Response {
                    regex: regex.clone(),
                    text,
                },
            );
            id
        };
        msg.channel_id
            .say(&ctx.http, format!("Response {id} is added"))
            .await?;
        Ok(())
    })
}

fn listresponse<'a>(
    ctx: &'a Context,
    msg: &'a Message,
    _tokens: &'a [String],
    state: &'a SharedState,
) -> CommandFuture<'a> {
    Box::pin(async move {
        let listing = {
            let cfg = state.config.read().await;
            cfg.responses
                .iter()
                .map(|(id, response)| format!("{}: /{}/ -> {}", id, response.regex, response.text))
                .collect::<Vec<_>>()
                .join("\n")
        };
        if listing.is_empty() {
            msg.channel_id.say(&ctx.http, "No responses").await?;
        } else {
            msg.channel_id.say(&ctx.http, listing).await?;
        }
        Ok(())
    })
}

fn delresponse<'a>(
    ctx: &'a Context,
    msg: &'a Message,
    tokens: &'a [String],
    state: &'a SharedState,
) -> CommandFuture<'a> {
    Box::pin(async move {
        let Some(id) = tokens.get(1).and_then(|raw| raw.parse::<u64>().ok()) else {
            msg.channel_id
                .say(&ctx.http, "Usage: delresponse <id>")
                .await?;
            return Ok(());
        };
        let removed = state.config.write().await.responses.remove(&id).is_some();
        let reply = if removed {
            format!("Response {id} is deleted")
        } else {
            format!("Response {id} does not exist")
        };
        msg.channel_id.say(&ctx.http, reply).await?;
        Ok(())
    })
}

fn addreaction<'a>(
    ctx: &'a Context,
    msg: &'a Message,
    tokens: &'a [String],
    state: &'a SharedState,
) -> CommandFuture<'a> {
    Box::pin(async move {
        if tokens.len() != 3 {
            msg.channel_id
                .say(&ctx.http, "Usage: addreaction <regex> <emoji>")
                .await?;
            return Ok(());
        }
        let regex = &tokens[1];
        if Regex::new(regex).is_err() {
            msg.channel_id
                .say(&ctx.http, format!("Invalid regex: {regex}"))
                .await?;
            return Ok(());
        }
        let id = {
            let mut cfg = state.config.write().await;
            let id = cfg.ids.next_reaction();
            cfg.reactions.insert(
                id,
                Reaction {
                    regex: regex.clone(),
                    emoji: tokens[2].clone(),
                },
            );
            id
        };
        msg.channel_id
            .say(&ctx.http, format!("Reaction {id} is added"))
            .await?;
        Ok(())
    })
}

fn listreaction<'a>(
    ctx: &'a Context,
    msg: &'a Message,
    _tokens: &'a [String],
    state: &'a SharedState,
) -> CommandFuture<'a> {
    Box::pin(async move {
        let listing = {
            let cfg = state.config.read().await;
            cfg.reactions
                .iter()
                .map(|(id, reaction)| format!("{}: /{}/ -> {}", id, reaction.regex, reaction.emoji))
                .collect::<Vec<_>>()
                .join("\n")
        };
        if listing.is_empty() {
            msg.channel_id.say(&ctx.http, "No reactions").await?;
        } else {
            msg.channel_id.say(&ctx.http, listing).await?;
        }
        Ok(())
    })
}

fn delreaction<'a>(
    ctx: &'a Context,
    msg: &'a Message,
    tokens: &'a [String],
    state: &'a SharedState,
) -> CommandFuture<'a> {
    Box::pin(async move {
        let Some(id) = tokens.get(1).and_then(|raw| raw.parse::<u64>().ok()) else {
            msg.channel_id
                .say(&ctx.http, "Usage: delreaction <id>")
                .await?;
            return Ok(());
        };
        let removed = state.config.write().await.reactions.remove(&id).is_some();
        let reply = if removed {
            format!("Reaction {id} is deleted")
        } else {
            format!("Reaction {id} does not exist")
        };
        msg.channel_id.say(&ctx.http, reply).await?;
        Ok(())
    })
}
