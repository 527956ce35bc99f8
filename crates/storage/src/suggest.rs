#![forbid(unsafe_code)]

use parking_lot::Mutex;
use std::collections::VecDeque;

/// Source of AI-style suggestions for the local backend.
///
/// Returning fewer than `count` ideas (or none) is allowed. The lifecycle
/// turns every missing suggestion into a blank placeholder.
pub trait Suggester: Send + Sync {
    fn suggest(&self, prompt: &str, count: u32) -> Vec<String>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NoSuggestions;

impl Suggester for NoSuggestions {
    fn suggest(&self, _prompt: &str, _count: u32) -> Vec<String> {
        Vec::new()
    }
}

/// Hands out a fixed list of ideas in order until it runs dry.
#[derive(Debug, Default)]
pub struct CannedSuggestions {
    ideas: Mutex<VecDeque<String>>,
}

impl CannedSuggestions {
    pub fn new<I, S>(ideas: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            ideas: Mutex::new(ideas.into_iter().map(Into::into).collect()),
        }
    }

    pub fn remaining(&self) -> usize {
        self.ideas.lock().len()
    }
}

impl Suggester for CannedSuggestions {
    fn suggest(&self, _prompt: &str, count: u32) -> Vec<String> {
        let mut ideas = self.ideas.lock();
        let take = ideas.len().min(count as usize);
        ideas.drain(..take).collect()
    }
}
