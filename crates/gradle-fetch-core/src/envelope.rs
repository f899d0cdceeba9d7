//! Serialized envelope carrying a batch of independently encoded values.
//!
//! Each entry is serialized on its own, so one value that cannot be encoded
//! (or later decoded) only costs its own entry. A key is either in the
//! success map or in the failure map, never both.
//!
//! # Wire layout
//!
//! ```text
//! u32 record count
//! per record:
//!   u32 entry key
//!   u8  discriminant   0 = values, 1 = failure
//!   0: u32 value count, then (tag, bytes) pairs
//!   1: JSON TransferableIssue
//! ```

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::catalog::{SharedValueCache, TypeCatalog};
use crate::error::{FetchError, Result};
use crate::issue::{BuilderIssue, TransferableIssue};
use crate::value::{Encodable, EncodedValue, TransferValue};
use crate::wire::{WireReader, WireWriter};

const MAGIC: &[u8; 4] = b"GFSM";
const RECORD_VALUES: u8 = 0;
const RECORD_FAILURE: u8 = 1;

/// Wire key of one entry: a sequence number unique within its batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntryKey(u32);

impl EntryKey {
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    pub const fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Display for EntryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The encoded value list of one entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SerializedEntries {
    values: Vec<EncodedValue>,
}

impl SerializedEntries {
    pub fn values(&self) -> &[EncodedValue] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Decodes every value, failing on the first one that does not decode.
    pub fn decode(
        &self,
        catalog: &TypeCatalog,
        cache: &mut SharedValueCache,
    ) -> Result<Vec<TransferValue>> {
        self.values
            .iter()
            .map(|value| cache.decode(catalog, value))
            .collect()
    }
}

/// Picks the catalog used to decode one entry.
pub trait CatalogResolver {
    fn catalog_for_key(&mut self, key: EntryKey) -> Arc<TypeCatalog>;
}

impl<F> CatalogResolver for F
where
    F: FnMut(EntryKey) -> Arc<TypeCatalog>,
{
    fn catalog_for_key(&mut self, key: EntryKey) -> Arc<TypeCatalog> {
        self(key)
    }
}

/// Turns a failure recorded for `key` into the values reported in its place.
pub trait IssueTransformer {
    fn transform_issue(&self, key: EntryKey, issue: TransferableIssue) -> Vec<TransferValue>;
}

impl<F> IssueTransformer for F
where
    F: Fn(EntryKey, TransferableIssue) -> Vec<TransferValue>,
{
    fn transform_issue(&self, key: EntryKey, issue: TransferableIssue) -> Vec<TransferValue> {
        self(key, issue)
    }
}

/// Immutable batch of serialized entries plus per-entry failures.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CustomSerializedMap {
    entries: BTreeMap<EntryKey, SerializedEntries>,
    failures: BTreeMap<EntryKey, TransferableIssue>,
}

impl CustomSerializedMap {
    pub fn builder() -> CustomSerializedMapBuilder {
        CustomSerializedMapBuilder::new()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.failures.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = EntryKey> + '_ {
        self.entries.keys().copied()
    }

    pub fn contains_key(&self, key: EntryKey) -> bool {
        self.entries.contains_key(&key)
    }

    pub fn serialized(&self, key: EntryKey) -> Option<&SerializedEntries> {
        self.entries.get(&key)
    }

    pub fn failure(&self, key: EntryKey) -> Option<&TransferableIssue> {
        self.failures.get(&key)
    }

    /// Serialization failures recorded while the map was built.
    pub fn failures(&self) -> impl Iterator<Item = (EntryKey, &TransferableIssue)> {
        self.failures.iter().map(|(key, issue)| (*key, issue))
    }

    /// Decodes the values of a single entry.
    ///
    /// Returns `Ok(None)` when the key was never added or failed to serialize.
    pub fn get_unserialized(
        &self,
        key: EntryKey,
        catalog: &TypeCatalog,
        cache: &mut SharedValueCache,
    ) -> Result<Option<Vec<TransferValue>>> {
        self.entries
            .get(&key)
            .map(|entries| entries.decode(catalog, cache))
            .transpose()
    }

    /// Decodes every entry with the catalog `resolver` picks for it.
    ///
    /// A recorded serialization failure, or an entry that fails to decode,
    /// is replaced by whatever `transformer` produces for it. Other entries
    /// are unaffected.
    pub fn deserialize(
        &self,
        resolver: &mut dyn CatalogResolver,
        cache: &mut SharedValueCache,
        transformer: &dyn IssueTransformer,
    ) -> BTreeMap<EntryKey, Vec<TransferValue>> {
        let mut result = BTreeMap::new();

        for (key, entries) in &self.entries {
            let catalog = resolver.catalog_for_key(*key);
            let values = match entries.decode(&catalog, cache) {
                Ok(values) => values,
                Err(err) => {
                    tracing::warn!("Failed to deserialize entry {}: {}", key, err);
                    transformer.transform_issue(*key, TransferableIssue::from_error(&err))
                }
            };
            result.insert(*key, values);
        }

        for (key, issue) in &self.failures {
            result.insert(*key, transformer.transform_issue(*key, issue.clone()));
        }

        result
    }

    pub fn write_to(&self, writer: &mut WireWriter) -> Result<()> {
        writer.put_len(self.entries.len() + self.failures.len())?;
        for (key, entries) in &self.entries {
            writer.put_u32(key.index());
            writer.put_u8(RECORD_VALUES);
            writer.put_len(entries.values.len())?;
            for value in &entries.values {
                writer.put_encoded(value)?;
            }
        }
        for (key, issue) in &self.failures {
            writer.put_u32(key.index());
            writer.put_u8(RECORD_FAILURE);
            writer.put_json(issue)?;
        }
        Ok(())
    }

    pub fn read_from(reader: &mut WireReader) -> Result<Self> {
        let count = reader.get_len()?;
        let mut map = Self::default();
        for _ in 0..count {
            let key = EntryKey::new(reader.get_u32()?);
            if map.entries.contains_key(&key) || map.failures.contains_key(&key) {
                return Err(FetchError::wire(format!("duplicate entry key {key}")));
            }
            match reader.get_u8()? {
                RECORD_VALUES => {
                    let len = reader.get_len()?;
                    let mut values = Vec::new();
                    for _ in 0..len {
                        values.push(reader.get_encoded()?);
                    }
                    map.entries.insert(key, SerializedEntries { values });
                }
                RECORD_FAILURE => {
                    let issue: TransferableIssue = reader.get_json()?;
                    map.failures.insert(key, issue);
                }
                other => {
                    return Err(FetchError::wire(format!(
                        "unknown record discriminant {other} for entry {key}"
                    )));
                }
            }
        }
        Ok(map)
    }

    pub fn to_bytes(&self) -> Result<Bytes> {
        let mut writer = WireWriter::new(MAGIC);
        self.write_to(&mut writer)?;
        Ok(writer.finish())
    }

    pub fn from_bytes(data: Bytes) -> Result<Self> {
        let mut reader = WireReader::new(data, MAGIC)?;
        let map = Self::read_from(&mut reader)?;
        reader.finish()?;
        Ok(map)
    }
}

/// Incrementally builds a [`CustomSerializedMap`].
#[derive(Debug, Default)]
pub struct CustomSerializedMapBuilder {
    entries: BTreeMap<EntryKey, SerializedEntries>,
    failures: BTreeMap<EntryKey, TransferableIssue>,
}

impl CustomSerializedMapBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serializes `value` and appends it to the entry for `key`.
    ///
    /// On failure the whole entry moves to the failure map. Values added to
    /// a failed key are dropped. Returns whether the value was stored.
    pub fn add_value(&mut self, key: EntryKey, value: &dyn Encodable) -> bool {
        if self.failures.contains_key(&key) {
            return false;
        }
        match value.to_encoded() {
            Ok(encoded) => {
                self.entries.entry(key).or_default().values.push(encoded);
                true
            }
            Err(err) => {
                tracing::warn!("Failed to serialize entry {}: {}", key, err);
                self.entries.remove(&key);
                self.failures.insert(key, TransferableIssue::from_error(&err));
                false
            }
        }
    }

    /// Adds an already encoded value.
    pub fn add_encoded(&mut self, key: EntryKey, value: EncodedValue) {
        if !self.failures.contains_key(&key) {
            self.entries.entry(key).or_default().values.push(value);
        }
    }

    /// Marks `key` as present with no values.
    pub fn add_empty(&mut self, key: EntryKey) {
        if !self.failures.contains_key(&key) {
            self.entries.entry(key).or_default();
        }
    }

    /// Records the outcome of one guarded builder invocation.
    ///
    /// `Ok(None)` leaves an empty entry, a [`BuilderIssue`] is stored as the
    /// entry's value.
    pub fn add_outcome(
        &mut self,
        key: EntryKey,
        outcome: std::result::Result<Option<TransferValue>, BuilderIssue>,
    ) {
        match outcome {
            Ok(Some(value)) => {
                self.add_value(key, &value);
            }
            Ok(None) => self.add_empty(key),
            Err(issue) => {
                self.add_value(key, &issue);
            }
        }
    }

    /// Records a failure detected outside of serialization for `key`.
    pub fn add_failure(&mut self, key: EntryKey, issue: TransferableIssue) {
        self.entries.remove(&key);
        self.failures.insert(key, issue);
    }

    pub fn create(self) -> CustomSerializedMap {
        CustomSerializedMap {
            entries: self.entries,
            failures: self.failures,
        }
    }
}
