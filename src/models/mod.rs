//! Domain models for Agent4BA.
//!
//! # Core Concepts
//!
//! - [`Item`]: A node of a project's planning hierarchy. Every item has an
//!   [`ItemType`] that decides which parent types it may hang under.
//! - [`Project`]: Top-level container owning a forest of items.
//! - [`RunStep`]: Audit trail entry recorded for each tool invocation.
//!
//! Tool payloads ([`GetItemInput`], [`MoveItemInput`], ...) live in `request`.

mod item;
mod project;
mod request;
mod run_step;

pub use item::*;
pub use project::*;
pub use request::*;
pub use run_step::*;
