use core::{
    fmt::{Debug, Display},
    hash::Hash,
};
use indexmap::IndexMap as _IndexMap;
use rustc_hash::FxBuildHasher;
use std::collections::HashSet as _HashSet;

/// Identifier of a tree or node.
///
/// Identifiers are chosen by the caller and must be unique across the whole
/// forest of one `Manager`. Any cloneable, hashable and printable type
/// qualifies: integers, `&'static str`, `String`, GUID newtypes.
pub trait NodeId: Clone + Eq + Hash + Debug + Display + Send + Sync + 'static {}

impl<T> NodeId for T where T: Clone + Eq + Hash + Debug + Display + Send + Sync + 'static {}

/// A value that can travel along the edges of a tree.
///
/// One produced value is borrowed by every child of a fan-out at once,
/// possibly from several threads, hence the `Sync` bound.
pub trait Payload: Send + Sync + 'static {}

impl<T> Payload for T where T: Send + Sync + 'static {}

pub(crate) type HashSet<T> = _HashSet<T, FxBuildHasher>;
pub(crate) type IndexMap<K, V> = _IndexMap<K, V, FxBuildHasher>;
