use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

lazy_static! {
    static ref WEBKIT_ENGINE: Regex = Regex::new(r"AppleWebKit/([^ ;]*)").unwrap();
}

/// How the loader learns that a stylesheet has been applied.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum DetectionStrategy {
    /// Trust the link element's native `load`/`error` events.
    #[serde(rename = "events")]
    EventBased,
    /// Scan the document's stylesheet list until the link shows up.
    /// Only the `error` event is used.
    #[serde(rename = "polling")]
    Polling,
}

impl DetectionStrategy {
    /// Picks a strategy from the platform's user agent.
    ///
    /// WebKit engines do not fire `load` reliably for `<link rel="stylesheet">`,
    /// so they get [`DetectionStrategy::Polling`]. Without a user agent the
    /// native events are assumed to work.
    pub fn probe(user_agent: Option<&str>) -> Self {
        match user_agent {
            Some(agent) if WEBKIT_ENGINE.is_match(agent) => Self::Polling,
            _ => Self::EventBased,
        }
    }

    /// Whether the link's native `load` event should be listened to.
    pub fn listens_for_load(self) -> bool {
        matches!(self, Self::EventBased)
    }
}
