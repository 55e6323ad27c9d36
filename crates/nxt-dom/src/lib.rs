#![forbid(unsafe_code)]

//! Host document model for the nxt enhancement runtime.
//!
//! A small arena-backed element tree with the three host facilities the
//! runtime consumes: subtree mutation records, element event listeners and
//! document-level host events. Elements are addressed by [`ElementId`]
//! handles that are allocated monotonically and never reused.

pub mod document;
pub mod event;
pub mod mutation;
pub mod shared;

pub use document::{Document, DomError, ElementId, ReadyState};
pub use event::{DomEvent, EventKind, HostEvent, ListenerId};
pub use mutation::{MutationRecord, ObserveOptions, ObserverId, RemovedNode};
pub use shared::SharedDocument;
