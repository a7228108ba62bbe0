//! Payload lookup.
//!
//! Resolves a fixture event into the [`GoalCard`] the template draws. The
//! production data store lives outside this crate; it plugs in through
//! [`PayloadSource`].

use std::collections::HashMap;
use std::fmt;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::card::GoalCard;

/// Event type ids that produce a goal card (goal, own goal).
pub const GOAL_EVENT_TYPES: [u32; 2] = [14, 15];

/// Which event to render.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventLookup {
    pub fixture_id: u64,
    pub event_id: u64,
    /// Card kind, e.g. `goal` (lowercased before use).
    pub event_type: String,
}

/// Error type for payload lookup.
#[derive(Debug, Clone)]
pub enum LookupError {
    /// No fixture or event matches the lookup.
    NotFound { fixture_id: u64, event_id: u64 },
    /// The event exists but is not a goal.
    UnsupportedEvent { event_id: u64, type_id: u32 },
    /// The backing store failed.
    Backend(String),
}

impl fmt::Display for LookupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LookupError::NotFound {
                fixture_id,
                event_id,
            } => write!(
                f,
                "event {} not found for fixture {}",
                event_id, fixture_id
            ),
            LookupError::UnsupportedEvent { event_id, type_id } => write!(
                f,
                "event {} has type {}, expected GOAL or OWN_GOAL",
                event_id, type_id
            ),
            LookupError::Backend(msg) => write!(f, "lookup failed: {}", msg),
        }
    }
}

impl std::error::Error for LookupError {}

/// Source of render payloads.
#[async_trait]
pub trait PayloadSource: Send + Sync {
    async fn fetch(&self, lookup: &EventLookup) -> Result<GoalCard, LookupError>;
}

/// In-memory payload source keyed by `(fixture_id, event_id)`.
#[derive(Default)]
pub struct StaticPayloadSource {
    /// (fixture_id, event_id) -> (event type id, card)
    cards: RwLock<HashMap<(u64, u64), (u32, GoalCard)>>,
}

impl StaticPayloadSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a card for an event.
    pub fn insert(&self, fixture_id: u64, type_id: u32, card: GoalCard) {
        self.cards
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((fixture_id, card.id), (type_id, card));
    }
}

#[async_trait]
impl PayloadSource for StaticPayloadSource {
    async fn fetch(&self, lookup: &EventLookup) -> Result<GoalCard, LookupError> {
        let cards = self.cards.read().unwrap_or_else(PoisonError::into_inner);
        let (type_id, card) = cards
            .get(&(lookup.fixture_id, lookup.event_id))
            .ok_or(LookupError::NotFound {
                fixture_id: lookup.fixture_id,
                event_id: lookup.event_id,
            })?;

        if !GOAL_EVENT_TYPES.contains(type_id) {
            return Err(LookupError::UnsupportedEvent {
                event_id: lookup.event_id,
                type_id: *type_id,
            });
        }

        let mut card = card.clone();
        card.kind = lookup.event_type.to_lowercase();
        Ok(card)
    }
}
