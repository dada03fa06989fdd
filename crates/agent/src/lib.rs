//! The Prowl agent — a steerable reasoning loop.
//!
//! The agent owns one conversation and drives the Reason→Act→Observe cycle
//! against a completion provider and a tool registry. What makes it
//! steerable: messages can be injected from outside the normal user-input
//! path at any time via [`Agent::steer`], and an idle agent can be woken
//! with [`Agent::resume`] — the mechanism the proactive pipeline uses to
//! deliver scheduled work into a conversation without losing continuity.

mod agent;

pub use agent::Agent;
