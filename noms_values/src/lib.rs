//! # A minimal typed value system for a content-addressed store.
//!
//! This crate provides just enough of a typed value system to represent the
//! objects a version-control-style [`datastore`](../datastore/index.html)
//! needs to move around: primitives, refs (content-hash pointers with a
//! target type), commit structs, and the dataset map. It intentionally does
//! not attempt to be a general-purpose extensible value system — there is no
//! struct-field reflection beyond [`Commit::get`] and no arbitrary nesting of
//! sets inside maps inside structs, because nothing above this layer needs
//! that generality.
//!
//! Values are serialized with [`rmp_serde`] (MessagePack) and addressed by
//! the SHA-256 hash of their encoded bytes, via [`chunk_store::Chunk`].
use chunk_store::{Chunk, Hash};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt::{self, Debug, Formatter};

pub mod types;

/// A map from dataset name to a ref pointing at that dataset's head commit.
///
/// Backed by [`im::OrdMap`], so cloning a dataset map (as required by the
/// functional `set` semantics the datastore needs) is O(1): the clone shares
/// structure with the original until one of the two is mutated.
pub type DatasetMap = im::OrdMap<String, RefValue>;

/// A set of refs to parent commits.
pub type ParentSet = im::OrdSet<RefValue>;

/// A typed, immutable value.
///
/// `Bool`, `String` and `Int` are primitives; `Ref`, `Set` and `Map` are the
/// container/reference kinds the datastore understands by name; `Commit` is
/// the one struct type this system knows about.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// A boolean primitive.
    Bool(bool),
    /// A UTF-8 string primitive.
    String(String),
    /// A 64-bit signed integer primitive.
    ///
    /// Unlike `Bool` and `String`, an `Int` value does not carry enough
    /// shape information on its own to be auto-typed by [`writeValue`]-style
    /// callers — see [`ValueKind`].
    Int(i64),
    /// A content-hash reference to another value, with its target type.
    Ref(RefValue),
    /// A set of refs to parent commits.
    Set(ParentSet),
    /// A dataset map.
    Map(DatasetMap),
    /// A commit struct.
    Commit(Commit),
}

/// A content hash reference to a value, paired with the type it points at.
///
/// Equality, ordering and hashing are defined purely in terms of
/// `target_hash`: two refs to the same content are the same ref, regardless
/// of what the caller believes the target type to be. This matches the
/// source system's "equality is hash equality" rule for ref-values.
#[derive(Clone, Serialize, Deserialize)]
pub struct RefValue {
    /// The hash of the chunk this ref points at.
    pub target_hash: Hash,
    /// The declared type of the value at `target_hash`.
    pub target_type: ValueType,
}

impl RefValue {
    /// Creates a ref to a commit.
    pub fn to_commit(target_hash: Hash) -> Self {
        Self {
            target_hash,
            target_type: ValueType::Commit,
        }
    }
}

impl Debug for RefValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Ref<{:?}>({})", self.target_type, self.target_hash)
    }
}

impl PartialEq for RefValue {
    fn eq(&self, other: &Self) -> bool {
        self.target_hash == other.target_hash
    }
}

impl Eq for RefValue {}

impl PartialOrd for RefValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for RefValue {
    fn cmp(&self, other: &Self) -> Ordering {
        self.target_hash.cmp(&other.target_hash)
    }
}

impl std::hash::Hash for RefValue {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.target_hash.hash(state);
    }
}

/// The type a [`RefValue`] or a [`ValueKind`] hint can name.
///
/// This is a closed set rather than a recursive, extensible type grammar:
/// the only things ever referenced by hash in this system are commits, so
/// `Commit` is the only ref target in practice. The other variants exist so
/// the process-wide type registry (see [`types`]) can describe the derived
/// container types by name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ValueType {
    /// The boolean primitive type.
    Bool,
    /// The string primitive type.
    String,
    /// The 64-bit integer primitive type.
    Int,
    /// The `Commit { value, parents }` struct type.
    Commit,
    /// `Ref<Commit>`.
    RefOfCommit,
    /// `Set<Ref<Commit>>`.
    SetOfRefCommit,
    /// `Map<String, Ref<Commit>>`.
    MapStringToRefCommit,
}

/// A type hint for [`datastore::DataStore::write_value`]-style callers.
///
/// Mirrors [`ValueType`] but is named separately because it plays a
/// different role: it is supplied by a caller *before* a value exists as a
/// `Value`, to disambiguate primitives that don't carry their own shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    /// See [`ValueType::Bool`].
    Bool,
    /// See [`ValueType::String`].
    String,
    /// See [`ValueType::Int`].
    Int,
}

/// Returns the auto-detected kind of `value`, if it is self-describing.
///
/// `Value::Int` is the one primitive that is not self-describing (there is
/// no shape difference between an `Int` meant to be written as-is and one
/// that, in a richer value system, might need a different numeric
/// representation) and therefore always requires an explicit [`ValueKind`].
/// Every other variant already carries its own type, so no hint is needed.
pub fn auto_kind(value: &Value) -> Option<ValueKind> {
    match value {
        Value::Bool(_) => Some(ValueKind::Bool),
        Value::String(_) => Some(ValueKind::String),
        Value::Int(_) => None,
        Value::Ref(_) | Value::Set(_) | Value::Map(_) | Value::Commit(_) => {
            // Self-describing container/struct kinds: the `write_value`
            // caller never has to supply a kind for these, but they also
            // aren't representable as a `ValueKind` (which only names
            // primitives), so there is no single answer to return here
            // other than "no hint needed".
            None
        }
    }
}

/// Returns `true` if `value` needs an explicit [`ValueKind`] to be written.
pub fn requires_explicit_kind(value: &Value) -> bool {
    matches!(value, Value::Int(_))
}

/// Returns the [`ValueType`] of `value` itself (not a hint for writing it).
///
/// For a ref, this is the ref's own *declared target* type, since a
/// `Ref<Commit>` stored inside a dataset map is itself of type
/// `RefOfCommit`, independent of what it points at.
pub fn type_of(value: &Value) -> ValueType {
    match value {
        Value::Bool(_) => ValueType::Bool,
        Value::String(_) => ValueType::String,
        Value::Int(_) => ValueType::Int,
        Value::Ref(_) => ValueType::RefOfCommit,
        Value::Set(_) => ValueType::SetOfRefCommit,
        Value::Map(_) => ValueType::MapStringToRefCommit,
        Value::Commit(_) => ValueType::Commit,
    }
}

/// A commit: a value paired with the set of commits it descends from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Commit {
    /// The payload of this commit.
    pub value: Value,
    /// Refs to this commit's parent commits. Empty for a root commit.
    pub parents: ParentSet,
}

impl Commit {
    /// Returns the value of the named field, or `None` if there is no such
    /// field on a commit struct.
    pub fn get(&self, field_name: &str) -> Option<Value> {
        match field_name {
            "value" => Some(self.value.clone()),
            "parents" => Some(Value::Set(self.parents.clone())),
            _ => None,
        }
    }
}

/// The error type for decode operations.
#[derive(Debug)]
pub enum DecodeError {
    /// The chunk's bytes did not deserialize as a [`Value`].
    Malformed(String),
}

impl From<rmp_serde::decode::Error> for DecodeError {
    fn from(e: rmp_serde::decode::Error) -> Self {
        DecodeError::Malformed(e.to_string())
    }
}

/// Serializes `value` to a chunk, addressed by the hash of its encoded
/// bytes.
pub fn encode(value: &Value) -> Chunk {
    let bytes = rmp_serde::to_vec(value).expect("Value serialization is infallible");
    Chunk::new(bytes)
}

static EMPTY_DATASET_MAP: Lazy<DatasetMap> = Lazy::new(DatasetMap::new);

/// Returns the canonical empty dataset map.
///
/// Backed by a process-wide [`once_cell::sync::Lazy`], so every caller that
/// needs "an empty map to start from" shares the same underlying `im` tree
/// rather than allocating a fresh one; cloning it out is O(1) regardless.
pub fn empty_dataset_map() -> DatasetMap {
    EMPTY_DATASET_MAP.clone()
}

/// Deserializes a non-empty chunk's bytes back into a [`Value`].
///
/// Embedded refs are not resolved here — they remain [`RefValue`] hash
/// pointers. Resolving them is the caller's job (in practice,
/// `datastore::DataStore::read_value`), which keeps decoding itself a pure,
/// synchronous function with no access to a store.
pub fn decode(chunk: &Chunk) -> Result<Value, DecodeError> {
    rmp_serde::from_slice(&chunk.data).map_err(DecodeError::from)
}
