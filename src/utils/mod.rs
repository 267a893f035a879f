pub mod algorithms;
pub mod message_cache;
pub mod pid;

pub use message_cache::{CachedMessage, MessageCache};

/// Neutralize mentions in generated or relayed text so the bot cannot be
/// baited into mass-pinging: a zero-width space is inserted after every `@`.
pub fn disable_pings(text: &str) -> String {
    text.replace('@', "@\u{200b}")
}

/// Extract a user id from a raw id or a `<@...>` / `<@!...>` mention token.
pub fn parse_user_token(token: &str) -> Option<u64> {
    let trimmed = token
        .strip_prefix("<@!")
        .or_else(|| token.strip_prefix("<@"))
        .map(|rest| rest.strip_suffix('>').unwrap_or(rest))
        .unwrap_or(token);
    trimmed.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pings_are_neutralized() {
        assert_eq!(disable_pings("hi @everyone"), "hi @\u{200b}everyone");
        assert_eq!(disable_pings("no pings here"), "no pings here");
    }

    #[test]
    fn user_tokens_parse() {
        assert_eq!(parse_user_token("123456"), Some(123456));
        assert_eq!(parse_user_token("<@123456>"), Some(123456));
        assert_eq!(parse_user_token("<@!123456>"), Some(123456));
        assert_eq!(parse_user_token("not-a-user"), None);
    }
}
