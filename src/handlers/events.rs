use std::sync::atomic::{AtomicBool, Ordering};

use regex_lite::Regex;
use serenity::all::{
    ChannelId, Context, EventHandler, GuildId, Mentionable, Message, MessageId,
    MessageUpdateEvent, ReactionType, Ready,
};
use serenity::async_trait;
use tracing::{debug, error, info};

use crate::commands;
use crate::config::{GuildSettings, User};
use crate::error::Result;
use crate::repl::Repl;
use crate::services::{AutosaveService, ReminderService};
use crate::state::SharedState;
use crate::utils::{disable_pings, CachedMessage};

/// Main event handler wired into the serenity client.
pub struct BotHandler {
    state: SharedState,
    background_started: AtomicBool,
}

impl BotHandler {
    pub fn new(state: SharedState) -> Self {
        Self {
            state,
            background_started: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl EventHandler for BotHandler {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("Logged in as: {} {}", ready.user.name, ready.user.id);

        {
            let mut cfg = self.state.config.write().await;
            for guild in &ready.guilds {
                let id = guild.id.get();
                cfg.guilds.entry(id).or_insert_with(|| GuildSettings::new(id));
            }
        }

        // Ready fires again on reconnect; the background loops must not.
        if self.background_started.swap(true, Ordering::SeqCst) {
            return;
        }

        let port = self.state.config.read().await.repl.port;
        match Repl::start(port).await {
            Ok(repl) => *self.state.repl.lock().await = Some(repl),
            Err(e) => error!("failed to start repl on port {}: {}", port, e),
        }

        AutosaveService::new(self.state.clone()).spawn();
        ReminderService::new(self.state.clone(), ctx.http.clone()).spawn();
    }

    async fn message(&self, ctx: Context, msg: Message) {
        // Any failure here is logged and swallowed so one bad message can
        // never kill the event loop.
        if let Err(e) = handle_message(&self.state, &ctx, &msg).await {
            error!("message handling failed: {}", e);
        }
    }

    async fn message_update(
        &self,
        _ctx: Context,
        _old: Option<Message>,
        _new: Option<Message>,
        event: MessageUpdateEvent,
    ) {
        if let (Some(author), Some(content)) = (&event.author, &event.content) {
            info!("<{}> (edit) {} -> {}", event.id, author.name, content);
        }
    }

    async fn message_delete(
        &self,
        _ctx: Context,
        channel_id: ChannelId,
        deleted_message_id: MessageId,
        _guild_id: Option<GuildId>,
    ) {
        info!("<{}> (delete) in channel {}", deleted_message_id, channel_id);
    }
}

async fn handle_message(state: &SharedState, ctx: &Context, msg: &Message) -> Result<()> {
    state.cache.lock().await.push(
        msg.channel_id.get(),
        CachedMessage {
            author_id: msg.author.id.get(),
            author_is_bot: msg.author.bot,
            content: msg.content.clone(),
        },
    );
    info!("<{}> {} -> {}", msg.id, msg.author.name, msg.content);

    let own_id = ctx.cache.current_user().id;
    if msg.author.id == own_id {
        return Ok(());
    }
    let Some(guild_id) = msg.guild_id.map(|id| id.get()) else {
        // Direct messages are not processed.
        return Ok(());
    };

    let prefix = {
        let mut cfg = state.config.write().await;
        let guild = cfg
            .guilds
            .entry(guild_id)
            .or_insert_with(|| GuildSettings::new(guild_id));
        if guild.is_whitelisted && !guild.whitelist.contains(&msg.channel_id.get()) {
            return Ok(());
        }
        let author_id = msg.author.id.get();
        let user = cfg
            .users
            .entry(author_id)
            .or_insert_with(|| User::new(author_id));
        if user.permission_level < 0 {
            return Ok(());
        }
        cfg.commands_prefix.clone()
    };

    if msg.content.starts_with(&prefix) {
        commands::dispatch(ctx, msg, state).await
    } else {
        process_regular_message(state, ctx, msg, guild_id).await?;
        process_repetitions(state, ctx, msg).await
    }
}

/// Passive processing for non-command messages, each feature scoped to its
/// per-guild channel allow-list.
async fn process_regular_message(
    state: &SharedState,
    ctx: &Context,
    msg: &Message,
    guild_id: u64,
) -> Result<()> {
    let channel_id = msg.channel_id.get();
    let (guild, responses, reactions) = {
        let cfg = state.config.read().await;
        let guild = cfg
            .guilds
            .get(&guild_id)
            .cloned()
            .unwrap_or_else(|| GuildSettings::new(guild_id));
        (guild, cfg.responses.clone(), cfg.reactions.clone())
    };

    let mentions_bot = msg.mentions_me(ctx).await.unwrap_or(false);
    if mentions_bot && guild.markov_responses_whitelist.contains(&channel_id) {
        let generated = state.markov.read().await.generate();
        if !generated.is_empty() {
            msg.channel_id
                .say(
                    &ctx.http,
                    format!("{} {}", msg.author.mention(), disable_pings(&generated)),
                )
                .await?;
        }
    } else if guild.markov_logging_whitelist.contains(&channel_id) {
        state.markov.write().await.add_string(&msg.content);
    }

    if guild.responses_whitelist.contains(&channel_id) {
        for response in responses.values() {
            let Ok(regex) = Regex::new(&response.regex) else {
                continue;
            };
            if regex.is_match(&msg.content) {
                msg.reply(&ctx.http, response.text.clone()).await?;
                break;
            }
        }
    }

    if guild.reactions_whitelist.contains(&channel_id) {
        for reaction in reactions.values() {
            let Ok(regex) = Regex::new(&reaction.regex) else {
                continue;
            };
            if regex.is_match(&msg.content) {
                info!("Added reaction {}", reaction.emoji);
                if let Err(e) = msg
                    .react(&ctx.http, ReactionType::Unicode(reaction.emoji.clone()))
                    .await
                {
                    debug!("failed to add reaction: {}", e);
                }
            }
        }
    }

    Ok(())
}

/// Three identical consecutive human messages get echoed once.
async fn process_repetitions(state: &SharedState, ctx: &Context, msg: &Message) -> Result<()> {
    let repeated = state.cache.lock().await.is_repetition(msg.channel_id.get());
    if repeated {
        msg.channel_id.say(&ctx.http, msg.content.clone()).await?;
    }
    Ok(())
}
