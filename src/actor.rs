//! Actor context for audit attribution
//!
//! Tracks who is responsible for the current unit of work. The request
//! layer calls [`set_actor`] once at the start of handling each unit of
//! work; everything written afterwards on the same thread is attributed
//! to that actor. When no actor is set, audit entries fall back to the
//! anonymous identity.
//!
//! Storage is thread-local, never process-global, so concurrent units of
//! work cannot leak actors into each other. Where the call chain allows
//! it, prefer passing an actor explicitly via the `*_as` methods on
//! [`AuditedStore`](crate::store::AuditedStore) and only rely on this
//! module at integration boundaries.

use std::cell::RefCell;

use serde::{Deserialize, Serialize};

/// Sentinel actor id reported when no actor is set
pub const ANONYMOUS_ACTOR_ID: u64 = 0;

/// The actor responsible for a unit of work
///
/// A loose reference to a user or system principal; the audit trail
/// stores only the id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    /// Identifier of the actor (0 is reserved for anonymous)
    pub id: u64,

    /// Human-readable name, for diagnostics only
    pub name: String,
}

impl Actor {
    /// Create a new actor
    pub fn new(id: u64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

thread_local! {
    static CURRENT_ACTOR: RefCell<Option<Actor>> = const { RefCell::new(None) };
}

/// Set the actor for the current thread's unit of work
pub fn set_actor(actor: Actor) {
    CURRENT_ACTOR.with(|cell| {
        *cell.borrow_mut() = Some(actor);
    });
}

/// Clear the current thread's actor
pub fn clear_actor() {
    CURRENT_ACTOR.with(|cell| {
        *cell.borrow_mut() = None;
    });
}

/// Get the actor for the current thread, if one is set
pub fn current_actor() -> Option<Actor> {
    CURRENT_ACTOR.with(|cell| cell.borrow().clone())
}

/// Get the current actor's id, or [`ANONYMOUS_ACTOR_ID`] when none is set
pub fn current_actor_id() -> u64 {
    current_actor().map_or(ANONYMOUS_ACTOR_ID, |actor| actor.id)
}

/// RAII guard that scopes an actor to a block of work
///
/// Sets the actor on construction and restores the previous value on
/// drop, so nested scopes unwind correctly even on early returns.
pub struct ActorScope {
    previous: Option<Actor>,
}

impl ActorScope {
    /// Enter a scope attributed to `actor`
    pub fn enter(actor: Actor) -> Self {
        let previous = CURRENT_ACTOR.with(|cell| cell.borrow_mut().replace(actor));
        Self { previous }
    }
}

impl Drop for ActorScope {
    fn drop(&mut self) {
        let previous = self.previous.take();
        CURRENT_ACTOR.with(|cell| {
            *cell.borrow_mut() = previous;
        });
    }
}
