use std::collections::{BTreeMap, HashMap};

use rand::Rng;
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const MARKOV_MODEL_VERSION: u32 = 1;

const BEGIN: &str = "__begin__";
const END: &str = "__end__";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MarkovNode {
    pub total: u64,
    pub next: BTreeMap<String, u64>,
}

impl MarkovNode {
    fn add_next(&mut self, word: &str) {
        *self.next.entry(word.to_string()).or_insert(0) += 1;
        self.total += 1;
    }
}

/// Bag-of-transitions text generator. Trained passively on whitelisted
/// channels, sampled on demand. Persisted as its own YAML document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Markov {
    pub version: u32,
    min_words: usize,
    max_words: usize,
    filters: Vec<String>,
    model: HashMap<String, MarkovNode>,
}

impl Default for Markov {
    fn default() -> Self {
        let mut model = HashMap::new();
        model.insert(BEGIN.to_string(), MarkovNode::default());
        Self {
            version: MARKOV_MODEL_VERSION,
            min_words: 1,
            max_words: 50,
            filters: vec![r"https?://\S+".to_string()],
            model,
        }
    }
}

impl Markov {
    /// Feed one message into the transition table. Tokens matching a filter
    /// regex are dropped; messages below the minimum word count are ignored.
    pub fn add_string(&mut self, text: &str) {
        let filters: Vec<Regex> = self
            .filters
            .iter()
            .filter_map(|f| Regex::new(f).ok())
            .collect();

        let words: Vec<&str> = text
            .split_whitespace()
            .filter(|word| !filters.iter().any(|f| f.is_match(word)))
            .collect();
        if words.len() < self.min_words {
            return;
        }

        let mut current = BEGIN;
        for word in words {
            self.model
                .entry(current.to_string())
                .or_default()
                .add_next(word);
            current = word;
        }
        self.model
            .entry(current.to_string())
            .or_default()
            .add_next(END);
    }

    pub fn generate(&self) -> String {
        self.generate_with(&mut rand::thread_rng())
    }

    pub fn generate_with<R: Rng>(&self, rng: &mut R) -> String {
        let mut words = Vec::new();
        let mut current = BEGIN.to_string();
        while words.len() < self.max_words {
            let Some(node) = self.model.get(&current) else {
                break;
            };
            if node.total == 0 {
                break;
            }
            let mut roll = rng.gen_range(0..node.total);
            let mut picked = None;
            for (word, count) in &node.next {
                if roll < *count {
                    picked = Some(word.clone());
                    break;
                }
                roll -= count;
            }
            let Some(word) = picked else {
                break;
            };
            if word == END {
                break;
            }
            words.push(word.clone());
            current = word;
        }
        words.join(" ")
    }

    /// Validate the transition table, repairing what can be repaired.
    /// Returns the number of fixes applied (0 means the model passed).
    pub fn check(&mut self) -> usize {
        let mut fixes = 0;

        if !self.model.contains_key(BEGIN) {
            self.model.insert(BEGIN.to_string(), MarkovNode::default());
            debug!("markov check: begin node was missing");
            fixes += 1;
        }

        // Edges may only point at existing nodes or the end sentinel.
        let referenced: Vec<String> = self
            .model
            .values()
            .flat_map(|node| node.next.keys().cloned())
            .filter(|word| word != END && !self.model.contains_key(word))
            .collect();
        for word in referenced {
            debug!("markov check: inserting missing node for '{}'", word);
            self.model.insert(word, MarkovNode::default());
            fixes += 1;
        }

        for (word, node) in self.model.iter_mut() {
            let before = node.next.len();
            node.next.retain(|_, count| *count > 0);
            if node.next.len() != before {
                debug!("markov check: dropped empty edges from '{}'", word);
                fixes += 1;
            }
            let sum: u64 = node.next.values().sum();
            if node.total != sum {
                debug!("markov check: fixed total for '{}'", word);
                node.total = sum;
                fixes += 1;
            }
        }

        fixes
    }

    /// Number of distinct words in the table, sentinels excluded.
    pub fn word_count(&self) -> usize {
        self.model.keys().filter(|k| *k != BEGIN).count()
    }

    /// Total number of recorded transitions.
    pub fn transition_count(&self) -> u64 {
        self.model.values().map(|node| node.total).sum()
    }

    pub fn clear(&mut self) {
        let defaults = Self::default();
        self.model = defaults.model;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn generated_words_come_from_training_data() {
        let mut markov = Markov::default();
        markov.add_string("the quick brown fox");
        markov.add_string("the lazy dog sleeps");

        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..20 {
            let sentence = markov.generate_with(&mut rng);
            for word in sentence.split_whitespace() {
                assert!(
                    ["the", "quick", "brown", "fox", "lazy", "dog", "sleeps"].contains(&word),
                    "unexpected word '{word}'"
                );
            }
        }
    }

    #[test]
    fn empty_model_generates_empty_string() {
        let markov = Markov::default();
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(markov.generate_with(&mut rng), "");
    }

    #[test]
    fn filters_drop_matching_tokens() {
        let mut markov = Markov::default();
        markov.add_string("look https://example.com here");
        assert_eq!(markov.word_count(), 2);
    }

    #[test]
    fn check_repairs_broken_totals_and_missing_nodes() {
        let mut markov = Markov::default();
        markov.add_string("one two");

        // Corrupt a total and remove an interior node.
        markov.model.get_mut(BEGIN).unwrap().total = 99;
        markov.model.remove("two");

        let fixes = markov.check();
        assert!(fixes >= 2);
        assert_eq!(markov.check(), 0);

        let begin = markov.model.get(BEGIN).unwrap();
        assert_eq!(begin.total, begin.next.values().sum::<u64>());
    }

    #[test]
    fn clear_resets_the_table() {
        let mut markov = Markov::default();
        markov.add_string("a b c");
        assert!(markov.transition_count() > 0);
        markov.clear();
        assert_eq!(markov.word_count(), 0);
        assert_eq!(markov.transition_count(), 0);
    }

    #[test]
    fn generation_respects_word_cap() {
        let mut markov = Markov::default();
        // A self-loop that never reaches the end sentinel on its own.
        markov.add_string("loop loop loop loop loop loop loop loop");
        let mut rng = StdRng::seed_from_u64(3);
        let sentence = markov.generate_with(&mut rng);
        assert!(sentence.split_whitespace().count() <= 50);
    }
}
