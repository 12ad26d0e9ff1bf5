//! A process-wide registry of the types this system knows about.
//!
//! Every [`ValueType`] other than the primitives has a stable name (e.g.
//! `"Set<Ref<Commit>>"`), and the hash of that name — not the hash of any
//! instance — is what ancestry-walking code uses to assert "this ref points
//! at a commit" without relying on a plain enum `==` against data that was
//! just deserialized off an untrusted chunk. Computing those name hashes is
//! cheap but not free, so they are computed once, lazily, and shared
//! process-wide.
use crate::ValueType;
use chunk_store::Hash;
use once_cell::sync::Lazy;

/// A named, content-hashed type descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeDescriptor {
    /// The stable, human-readable name of the type.
    pub name: &'static str,
    /// The hash of `name`'s bytes, used as a cheap type identity check.
    pub hash: Hash,
}

impl TypeDescriptor {
    fn of(name: &'static str) -> Self {
        Self {
            name,
            hash: Hash::of_bytes(name.as_bytes()),
        }
    }
}

/// The type descriptor for the `Commit` struct type.
pub static COMMIT: Lazy<TypeDescriptor> = Lazy::new(|| TypeDescriptor::of("Commit"));

/// The type descriptor for `Ref<Commit>`.
pub static REF_OF_COMMIT: Lazy<TypeDescriptor> = Lazy::new(|| TypeDescriptor::of("Ref<Commit>"));

/// The type descriptor for `Set<Ref<Commit>>`.
pub static SET_OF_REF_COMMIT: Lazy<TypeDescriptor> =
    Lazy::new(|| TypeDescriptor::of("Set<Ref<Commit>>"));

/// The type descriptor for `Map<String, Ref<Commit>>`.
pub static MAP_STRING_TO_REF_COMMIT: Lazy<TypeDescriptor> =
    Lazy::new(|| TypeDescriptor::of("Map<String, Ref<Commit>>"));

/// Returns the type descriptor registered for `t`, if any.
///
/// `Bool`, `String` and `Int` are primitive kinds with no registry entry:
/// their identity is the variant tag itself, not a content hash.
pub fn descriptor_of(t: ValueType) -> Option<&'static TypeDescriptor> {
    match t {
        ValueType::Commit => Some(&COMMIT),
        ValueType::RefOfCommit => Some(&REF_OF_COMMIT),
        ValueType::SetOfRefCommit => Some(&SET_OF_REF_COMMIT),
        ValueType::MapStringToRefCommit => Some(&MAP_STRING_TO_REF_COMMIT),
        ValueType::Bool | ValueType::String | ValueType::Int => None,
    }
}
