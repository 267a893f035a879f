use std::collections::{HashMap, VecDeque};

const CHANNEL_CAPACITY: usize = 10;

/// A lightweight snapshot of a message, enough for repetition detection and
/// edit/delete logging.
#[derive(Debug, Clone)]
pub struct CachedMessage {
    pub author_id: u64,
    pub author_is_bot: bool,
    pub content: String,
}

/// Bounded per-channel ring of the most recent messages.
#[derive(Debug, Default)]
pub struct MessageCache {
    channels: HashMap<u64, VecDeque<CachedMessage>>,
}

impl MessageCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, channel_id: u64, message: CachedMessage) {
        let ring = self.channels.entry(channel_id).or_default();
        if ring.len() == CHANNEL_CAPACITY {
            ring.pop_back();
        }
        ring.push_front(message);
    }

    /// The `index`-th most recent message in a channel (0 = newest).
    pub fn get(&self, channel_id: u64, index: usize) -> Option<&CachedMessage> {
        self.channels.get(&channel_id).and_then(|ring| ring.get(index))
    }

    /// True when the three newest messages in the channel carry identical text
    /// and none of them was authored by a bot.
    pub fn is_repetition(&self, channel_id: u64) -> bool {
        let (Some(a), Some(b), Some(c)) = (
            self.get(channel_id, 0),
            self.get(channel_id, 1),
            self.get(channel_id, 2),
        ) else {
            return false;
        };
        a.content == b.content
            && b.content == c.content
            && !a.author_is_bot
            && !b.author_is_bot
            && !c.author_is_bot
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(author_id: u64, content: &str) -> CachedMessage {
        CachedMessage {
            author_id,
            author_is_bot: false,
            content: content.to_string(),
        }
    }

    #[test]
    fn keeps_newest_first() {
        let mut cache = MessageCache::new();
        cache.push(1, msg(10, "one"));
        cache.push(1, msg(11, "two"));
        assert_eq!(cache.get(1, 0).unwrap().content, "two");
        assert_eq!(cache.get(1, 1).unwrap().content, "one");
        assert!(cache.get(1, 2).is_none());
        assert!(cache.get(2, 0).is_none());
    }

    #[test]
    fn ring_is_bounded() {
        let mut cache = MessageCache::new();
        for i in 0..25 {
            cache.push(1, msg(10, &format!("m{i}")));
        }
        assert_eq!(cache.get(1, 0).unwrap().content, "m24");
        assert!(cache.get(1, CHANNEL_CAPACITY).is_none());
    }

    #[test]
    fn repetition_needs_three_identical_human_messages() {
        let mut cache = MessageCache::new();
        cache.push(1, msg(10, "hey"));
        cache.push(1, msg(11, "hey"));
        assert!(!cache.is_repetition(1));
        cache.push(1, msg(12, "hey"));
        assert!(cache.is_repetition(1));

        cache.push(1, msg(13, "other"));
        assert!(!cache.is_repetition(1));
    }

    #[test]
    fn repetition_ignores_bot_authors() {
        let mut cache = MessageCache::new();
        for _ in 0..2 {
            cache.push(1, msg(10, "hey"));
        }
        cache.push(
            1,
            CachedMessage {
                author_id: 99,
                author_is_bot: true,
                content: "hey".to_string(),
            },
        );
        assert!(!cache.is_repetition(1));
    }
}
