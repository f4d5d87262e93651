//! Registry of machines awaiting a deferred routine start.
//!
//! Transitions never start the new state's routine directly; they register
//! the machine here, and the engine drains the registry once per tick. The
//! registry is an explicit, owned container passed around by reference --
//! there is no global state and no intrusive links back into the machines.
//!
//! Ordering: registration pushes to the front, so a drain processes machines
//! most-recently-registered first. That stack discipline is deliberate,
//! observable behavior; see the drain tests below and in `engine.rs`.

use crate::id::EntityId;
use std::collections::VecDeque;

/// Ordered set of machines whose new state's routine has not started yet.
///
/// Invariant: a given entity appears at most once. Registering an entity
/// that is already present moves it to the front instead of duplicating it.
#[derive(Debug, Default)]
pub struct PendingScheduler {
    /// Front = most recently registered.
    order: VecDeque<EntityId>,
}

impl PendingScheduler {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            order: VecDeque::new(),
        }
    }

    /// Register an entity for a deferred routine start at the next drain.
    ///
    /// If the entity is already registered this is a move-to-front: final
    /// membership is unchanged, only recency.
    pub fn register(&mut self, entity: EntityId) {
        self.deregister(entity);
        self.order.push_front(entity);
    }

    /// Remove an entity's pending registration, if any. Returns whether the
    /// entity was present.
    pub fn deregister(&mut self, entity: EntityId) -> bool {
        if let Some(idx) = self.order.iter().position(|&e| e == entity) {
            self.order.remove(idx);
            true
        } else {
            false
        }
    }

    /// Whether the entity currently has a pending registration.
    pub fn contains(&self, entity: EntityId) -> bool {
        self.order.iter().any(|&e| e == entity)
    }

    /// Number of pending registrations.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether no registrations are pending.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// The registered entities in drain order (most recent first).
    ///
    /// The drain loop iterates this snapshot rather than the live registry:
    /// entities registered while the drain runs are picked up by the next
    /// drain, never the one in progress.
    pub fn snapshot(&self) -> Vec<EntityId> {
        self.order.iter().copied().collect()
    }
}

// ===========================================================================
// Tests
// ===========================================================================
