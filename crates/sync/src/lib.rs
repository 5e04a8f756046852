//! Real-time data synchronization layer.
//!
//! Two components sit between consumers and the remote document store:
//!
//! - [`subscription`] -- binding slots that keep a locally cached,
//!   continuously fresh copy of a live query or document, with explicit
//!   bind/release lifecycle.
//! - [`debounce`] -- the debounced mutation pipeline that coalesces rapid
//!   local field edits into infrequent remote writes.
//!
//! Everything here is non-blocking: reads return cached state immediately,
//! and deliveries arrive through spawned tasks.

pub mod debounce;
pub mod subscription;

pub use debounce::{DebouncedWriter, WriteFailure, DEFAULT_DEBOUNCE};
pub use subscription::{
    DocumentSubscription, QuerySubscription, SlotState, SlotView,
};
