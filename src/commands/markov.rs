use serenity::all::{Context, Message};

use super::{CommandFuture, CommandRegistry};
use crate::state::SharedState;
use crate::utils::disable_pings;

pub fn bind(registry: &mut CommandRegistry) {
    registry.bind("markov", 0, markov);
    registry.bind("markovstats", 0, markovstats);
    registry.bind("dropmarkov", 1, dropmarkov);
}

fn markov<'a>(
    ctx: &'a Context,
    msg: &'a Message,
    _tokens: &'a [String],
    state: &'a SharedState,
) -> CommandFuture<'a> {
    Box::pin(async move {
        let generated = state.markov.read().await.generate();
        let reply = if generated.is_empty() {
            "The model is empty, nothing to generate yet".to_string()
        } else {
            disable_pings(&generated)
        };
        msg.channel_id.say(&ctx.http, reply).await?;
        Ok(())
    })
}

fn markovstats<'a>(
    ctx: &'a Context,
    msg: &'a Message,
    _tokens: &'a [String],
    state: &'a SharedState,
) -> CommandFuture<'a> {
    Box::pin(async move {
        let (words, transitions) = {
            let markov = state.markov.read().await;
            (markov.word_count(), markov.transition_count())
        };
        msg.channel_id
            .say(
                &ctx.http,
                format!("Model: {words} word(s), {transitions} transition(s)"),
            )
            .await?;
        Ok(())
    })
}

fn dropmarkov<'a>(
    ctx: &'a Context,
    msg: &'a Message,
    _tokens: &'a [String],
    state: &'a SharedState,
) -> CommandFuture<'a> {
    Box::pin(async move {
        state.markov.write().await.clear();
        msg.channel_id.say(&ctx.http, "The model is dropped").await?;
        Ok(())
    })
}
