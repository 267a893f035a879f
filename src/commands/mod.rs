pub mod admin;
pub mod general;
pub mod markov;
pub mod reminder;
pub mod response;

use std::collections::{HashMap, HashSet};

use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serenity::all::{Context, Mentionable, Message};
use tracing::debug;

use crate::config::User;
use crate::error::Result;
use crate::state::SharedState;
use crate::utils::algorithms::levenshtein_distance;

pub type CommandFuture<'a> = BoxFuture<'a, Result<()>>;

/// Bound command handlers are plain fn pointers so the registry stays `Clone`
/// and serializable; they are re-attached by `register_builtins` after every
/// deserialization.
pub type CommandHandler =
    for<'a> fn(&'a Context, &'a Message, &'a [String], &'a SharedState) -> CommandFuture<'a>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Denied {
    Channel,
    Permission,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Command {
    pub name: String,
    #[serde(skip)]
    pub handler: Option<CommandHandler>,
    /// Static response template for user-defined commands. Supports
    /// `@author@`, `@args@` and `@argN@` substitution.
    pub message: Option<String>,
    /// Minimum permission level required to call this command.
    pub permission: i64,
    pub is_global: bool,
    pub channels: HashSet<u64>,
    pub times_called: u64,
}

impl Command {
    pub fn with_handler(name: &str, permission: i64, handler: CommandHandler) -> Self {
        Self {
            name: name.to_string(),
            handler: Some(handler),
            message: None,
            permission,
            is_global: true,
            channels: HashSet::new(),
            times_called: 0,
        }
    }

    pub fn with_message(name: &str, permission: i64, message: &str) -> Self {
        Self {
            name: name.to_string(),
            handler: None,
            message: Some(message.to_string()),
            permission,
            is_global: true,
            channels: HashSet::new(),
            times_called: 0,
        }
    }

    pub fn is_available(&self, channel_id: u64) -> bool {
        self.is_global || self.channels.contains(&channel_id)
    }

    /// Gate an invocation on channel scope, then caller permission. `None`
    /// callers (internal invocations) skip the permission check.
    pub fn authorize(
        &self,
        channel_id: u64,
        user: Option<&User>,
    ) -> std::result::Result<(), Denied> {
        if !self.is_available(channel_id) {
            return Err(Denied::Channel);
        }
        if let Some(user) = user {
            if self.permission > user.permission_level {
                return Err(Denied::Permission);
            }
        }
        Ok(())
    }

    pub async fn run(
        &self,
        ctx: &Context,
        msg: &Message,
        tokens: &[String],
        user: Option<&User>,
        state: &SharedState,
    ) -> Result<()> {
        match self.authorize(msg.channel_id.get(), user) {
            Err(Denied::Channel) => {
                msg.channel_id
                    .say(
                        &ctx.http,
                        format!("Command '{}' is not available in this channel", tokens[0]),
                    )
                    .await?;
                return Ok(());
            }
            Err(Denied::Permission) => {
                msg.channel_id
                    .say(
                        &ctx.http,
                        format!("You don't have permission to call command '{}'", tokens[0]),
                    )
                    .await?;
                return Ok(());
            }
            Ok(()) => {}
        }

        if let Some(handler) = self.handler {
            handler(ctx, msg, tokens, state).await
        } else if let Some(template) = &self.message {
            let rendered =
                substitute_template(template, &msg.author.mention().to_string(), tokens);
            if !rendered.trim().is_empty() {
                msg.channel_id.say(&ctx.http, rendered).await?;
            }
            Ok(())
        } else {
            msg.channel_id
                .say(&ctx.http, format!("Command '{}' is not callable", tokens[0]))
                .await?;
            Ok(())
        }
    }
}

/// Render a static response template. `tokens[0]` is the command name, so
/// `@arg0@` expands to it and `@args@` to everything after it.
pub fn substitute_template(template: &str, author_mention: &str, tokens: &[String]) -> String {
    let mut rendered = template.replace("@author@", author_mention);
    let args = tokens.get(1..).unwrap_or(&[]).join(" ");
    rendered = rendered.replace("@args@", &args);
    for (i, token) in tokens.iter().enumerate() {
        rendered = rendered.replace(&format!("@arg{i}@"), token);
    }
    rendered
}

/// Split a prefixed message into command tokens. Returns `None` when the
/// prefix is not present or nothing follows it.
pub fn tokenize(content: &str, prefix: &str) -> Option<Vec<String>> {
    let mut tokens: Vec<String> = content.split_whitespace().map(str::to_string).collect();
    let first = tokens.first_mut()?;
    *first = first.strip_prefix(prefix)?.to_string();
    if first.is_empty() {
        return None;
    }
    Some(tokens)
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommandRegistry {
    pub data: HashMap<String, Command>,
    pub aliases: HashMap<String, String>,
}

impl CommandRegistry {
    /// Attach a builtin handler. An entry restored from disk keeps its
    /// persisted permission and channel scope; only the handler is refreshed.
    pub fn bind(&mut self, name: &str, permission: i64, handler: CommandHandler) {
        match self.data.get_mut(name) {
            Some(command) => command.handler = Some(handler),
            None => {
                self.data.insert(
                    name.to_string(),
                    Command::with_handler(name, permission, handler),
                );
            }
        }
    }

    /// Attach every builtin command group.
    pub fn register_builtins(&mut self) {
        general::bind(self);
        admin::bind(self);
        reminder::bind(self);
        markov::bind(self);
        response::bind(self);
    }

    /// Canonical command name for a raw token: exact name first, then alias.
    pub fn resolve_name<'a>(&'a self, raw: &'a str) -> Option<&'a str> {
        if self.data.contains_key(raw) {
            return Some(raw);
        }
        self.aliases
            .get(raw)
            .map(String::as_str)
            .filter(|canonical| self.data.contains_key(*canonical))
    }

    /// Closest known command or alias by edit distance.
    pub fn suggest(&self, unknown: &str) -> Option<String> {
        self.data
            .keys()
            .chain(self.aliases.keys())
            .min_by_key(|candidate| levenshtein_distance(unknown, candidate))
            .cloned()
    }
}

/// Entry point from the message event: resolve, count, and run a command.
pub async fn dispatch(ctx: &Context, msg: &Message, state: &SharedState) -> Result<()> {
    let (command, tokens, user) = {
        let mut cfg = state.config.write().await;
        let prefix = cfg.commands_prefix.clone();
        let Some(tokens) = tokenize(&msg.content, &prefix) else {
            debug!("ignoring empty command");
            return Ok(());
        };
        let Some(canonical) = cfg.commands.resolve_name(&tokens[0]).map(str::to_string) else {
            let suggestion = cfg.commands.suggest(&tokens[0]);
            drop(cfg);
            let reply = match suggestion {
                Some(suggestion) => format!(
                    "Unknown command '{}', probably you meant '{}'",
                    tokens[0], suggestion
                ),
                None => format!("Unknown command '{}'", tokens[0]),
            };
            msg.channel_id.say(&ctx.http, reply).await?;
            return Ok(());
        };

        let Some(command) = cfg.commands.data.get_mut(&canonical) else {
            return Ok(());
        };
        command.times_called += 1;
        let command = command.clone();
        let user = cfg.users.get(&msg.author.id.get()).cloned();
        (command, tokens, user)
    };

    command.run(ctx, msg, &tokens, user.as_ref(), state).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop<'a>(
        _ctx: &'a Context,
        _msg: &'a Message,
        _tokens: &'a [String],
        _state: &'a SharedState,
    ) -> CommandFuture<'a> {
        Box::pin(async { Ok(()) })
    }

    fn tokens(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|p| p.to_string()).collect()
    }

    #[test]
    fn tokenize_strips_prefix_and_collapses_whitespace() {
        assert_eq!(
            tokenize("!ping  a   b", "!"),
            Some(tokens(&["ping", "a", "b"]))
        );
        assert_eq!(tokenize("!ping", "!"), Some(tokens(&["ping"])));
    }

    #[test]
    fn tokenize_rejects_empty_commands() {
        assert_eq!(tokenize("!", "!"), None);
        assert_eq!(tokenize("! ping", "!"), None);
        assert_eq!(tokenize("", "!"), None);
        assert_eq!(tokenize("ping", "!"), None);
    }

    #[test]
    fn substitution_replaces_every_token() {
        let out = substitute_template(
            "@author@ said @args@ (@arg0@ @arg1@ @arg1@)",
            "<@1>",
            &tokens(&["echo", "hi", "there"]),
        );
        assert_eq!(out, "<@1> said hi there (echo hi hi)");
    }

    #[test]
    fn substitution_is_idempotent_without_tokens() {
        let template = "plain text with an email@example.com";
        let once = substitute_template(template, "<@1>", &tokens(&["cmd"]));
        let twice = substitute_template(&once, "<@1>", &tokens(&["cmd"]));
        assert_eq!(once, template);
        assert_eq!(once, twice);
    }

    #[test]
    fn insufficient_permission_never_reaches_the_handler() {
        let command = Command::with_handler("secret", 2, noop);
        let user = User::new(1);
        assert_eq!(command.authorize(10, Some(&user)), Err(Denied::Permission));

        let mut admin = User::new(2);
        admin.permission_level = 2;
        assert_eq!(command.authorize(10, Some(&admin)), Ok(()));
    }

    #[test]
    fn banned_users_fail_even_level_zero_commands() {
        let command = Command::with_handler("ping", 0, noop);
        let mut banned = User::new(1);
        banned.permission_level = -1;
        assert_eq!(
            command.authorize(10, Some(&banned)),
            Err(Denied::Permission)
        );
    }

    #[test]
    fn non_global_commands_are_confined_to_their_channels() {
        let mut command = Command::with_handler("local", 0, noop);
        command.is_global = false;
        command.channels.insert(10);

        let user = User::new(1);
        assert_eq!(command.authorize(10, Some(&user)), Ok(()));
        assert_eq!(command.authorize(11, Some(&user)), Err(Denied::Channel));
    }

    #[test]
    fn internal_invocations_skip_the_permission_check() {
        let command = Command::with_handler("secret", 2, noop);
        assert_eq!(command.authorize(10, None), Ok(()));
    }

    #[test]
    fn ping_at_permission_zero_is_runnable_anywhere() {
        let command = Command::with_handler("ping", 0, noop);
        let user = User::new(1);
        for channel in [1u64, 99, 12345] {
            assert_eq!(command.authorize(channel, Some(&user)), Ok(()));
        }
    }

    #[test]
    fn aliases_resolve_to_their_canonical_command() {
        let mut registry = CommandRegistry::default();
        registry.bind("ping", 0, noop);
        registry.aliases.insert("p".to_string(), "ping".to_string());
        registry
            .aliases
            .insert("gone".to_string(), "removed".to_string());

        assert_eq!(registry.resolve_name("ping"), Some("ping"));
        assert_eq!(registry.resolve_name("p"), Some("ping"));
        assert_eq!(registry.resolve_name("gone"), None);
        assert_eq!(registry.resolve_name("pong"), None);
    }

    #[test]
    fn suggestion_picks_the_closest_name() {
        let mut registry = CommandRegistry::default();
        registry.bind("ping", 0, noop);
        registry.bind("markov", 0, noop);
        assert_eq!(registry.suggest("pong"), Some("ping".to_string()));
        assert_eq!(registry.suggest("markof"), Some("markov".to_string()));
    }

    #[test]
    fn persisted_metadata_survives_rebinding() {
        let mut registry = CommandRegistry::default();
        registry.bind("ping", 0, noop);
        registry.data.get_mut("ping").unwrap().permission = 3;
        registry.data.get_mut("ping").unwrap().is_global = false;

        // Round-trip drops the handler, as the persisted form does.
        let yaml = serde_yaml::to_string(&registry).unwrap();
        let mut restored: CommandRegistry = serde_yaml::from_str(&yaml).unwrap();
        assert!(restored.data["ping"].handler.is_none());

        restored.bind("ping", 0, noop);
        let ping = &restored.data["ping"];
        assert!(ping.handler.is_some());
        assert_eq!(ping.permission, 3);
        assert!(!ping.is_global);
    }

    #[test]
    fn message_commands_round_trip() {
        let mut registry = CommandRegistry::default();
        registry.data.insert(
            "hello".to_string(),
            Command::with_message("hello", 0, "Hi @author@!"),
        );

        let yaml = serde_yaml::to_string(&registry).unwrap();
        let restored: CommandRegistry = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(
            restored.data["hello"].message.as_deref(),
            Some("Hi @author@!")
        );
    }
}
