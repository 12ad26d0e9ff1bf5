//! Resolving the root commit's value into a dataset map.
//!
//! The root hash a chunk store hands back is just a hash; turning it into
//! the `DatasetMap` callers actually want means fetching and decoding that
//! one value and checking it has the shape a dataset map is supposed to
//! have. [`crate::DataStore`] is the one that knows how to fetch-and-decode
//! (with caching and single-flight de-duplication); this module only knows
//! how to validate the result once it has one.
use crate::Error;
use noms_values::{type_of, DatasetMap, Value, ValueType};

/// Returns the root's dataset map, given the already-decoded root value.
///
/// `root_value` is `None` when the store's root hash is the empty sentinel,
/// meaning no dataset has ever been committed.
pub fn resolve(root_value: Option<Value>) -> Result<DatasetMap, Error> {
    match root_value {
        None => Ok(noms_values::empty_dataset_map()),
        Some(Value::Map(map)) => Ok(map),
        Some(other) => Err(Error::TypeMismatch {
            expected: ValueType::MapStringToRefCommit,
            found: type_of(&other),
        }),
    }
}
