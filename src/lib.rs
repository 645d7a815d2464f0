//! Typed, in-process dataflow trees.
//!
//! A *source* produces values that propagate through a tree of *transform*
//! nodes. Every node attaches to a named parent and fans its output out to all
//! of its children, optionally in parallel. Independent stages compose
//! without a hand-written driver loop.
//!
//! This crate:
//! - Keeps a forest of trees behind one [`Manager`], each tree rooted at a
//!   [`Source`] and optionally driven by its own pull-loop thread.
//! - Attaches nodes by identifier through a type-erased recursive search that
//!   still checks, at attach time, that the parent produces what the new node
//!   consumes.
//! - Hands each produced value to all children as a shared borrow and drops it
//!   exactly once, after the slowest child returned.
//! - Runs multi-threaded fan-outs on a bounded rayon pool; nested fan-outs
//!   reuse the same pool instead of spawning threads per value.
//! - Stops cooperatively: a shared running flag ends pull loops after their
//!   current activation and makes nodes drop results produced after it flips.
//!
//! Key modules:
//! - `capability`: the caller-supplied [`Source`] and [`Transform`] traits
//!   and closure adapters.
//! - `manager`: the forest, its construction operations and controls.
//! - `tree`: one source, its node hierarchy and its pull loop.
//! - `config`: [`ManagerConfig`].
//! - `error`: [`GraphError`] and [`SetupError`].
//!
//! Quick start:
//! 1. Create a [`Manager`] with identifiers of your choice.
//! 2. `add_dag` a source, then `add_node` transforms onto it or onto each
//!    other, parents before children.
//! 3. Drive the forest manually with `push_once`, or `start` the pull loops
//!    and `shutdown` them later.
//!
//! Nodes can only be attached to a tree without a live pull loop. Payloads are
//! shared between threads while a fan-out is in flight, so they must be
//! `Send + Sync`.

/// Caller-supplied behavior invoked by the engine.
///
/// Exposes [`Source`] (no input, one optional output per activation) and
/// [`Transform`] (one borrowed input, one optional output), plus
/// [`fn_source`] and [`fn_transform`] to wrap closures.
pub mod capability;
/// Manager configuration.
pub mod config;
mod context;
/// Construction and setup errors.
pub mod error;
/// The forest of trees.
///
/// Creates trees and nodes, validates every attach before touching the
/// forest, and controls the pull loops.
pub mod manager;
mod node;
mod sync;
/// A tree: one source, its fan-out hierarchy and its pull loop.
pub mod tree;
/// Identifier and payload bounds shared across the crate.
pub mod types;
mod utils;

pub use crate::{
    capability::{FnSource, FnTransform, Source, Transform, fn_source, fn_transform},
    config::ManagerConfig,
    context::StopHandle,
    error::{GraphError, SetupError},
    manager::Manager,
    tree::{Dag, Tree},
    types::{NodeId, Payload},
};
