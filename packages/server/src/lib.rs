//! Collaborative session orchestrator.
//!
//! Hosts open sessions, guests ask to join with a short code, the host approves
//! or rejects them, and the orchestrator keeps the roster, the code lifecycle
//! and join abuse controls consistent. The HTTP gateway in [`ui`] exposes every
//! operation so several processes can share one session owner.

// layers
pub mod domain;
pub mod infrastructure;
pub mod ui;
pub mod usecase;
