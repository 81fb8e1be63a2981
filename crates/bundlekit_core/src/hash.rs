use std::hash::Hasher;

use serde::Serialize;
use xxhash_rust::xxh3::Xxh3;

/// Hasher behind every identifier written to the compression cache file.
///
/// xxh3 output is stable across runs, machines and platforms, which the
/// on-disk cache keys depend on.
pub type IdentifierHasher = Xxh3;

/// Hash any serializable value through its JSON representation.
///
/// Field order is the declaration order of the serialized structs and maps are
/// expected to be ordered (`BTreeMap`), so equal values always hash equally.
pub fn hash_serialized<T: Serialize>(value: &T) -> anyhow::Result<String> {
  let mut hasher = IdentifierHasher::default();
  hasher.write(&serde_json::to_vec(value)?);
  Ok(format!("{:016x}", hasher.finish()))
}
