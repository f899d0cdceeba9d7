//! Flattening of caller queries into one shippable builder map.
//!
//! Callers group queries under their own keys. Every query gets a wire key
//! of its own, and [`QueryRouting`] remembers which caller key, position and
//! classpath each wire key belongs to.

use std::collections::BTreeMap;

use gradle_fetch_core::{ClassPath, CustomSerializedMap, EntryKey, TransferableIssue};

use crate::query::InfoQuery;

/// Origin of one wire key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuerySlot<K> {
    pub key: K,
    /// Position of the query among those registered under `key`.
    pub position: usize,
    pub classpath: ClassPath,
    pub builder_name: String,
}

/// Maps wire keys back to the queries they were created for.
#[derive(Debug, Clone)]
pub struct QueryRouting<K> {
    slots: BTreeMap<EntryKey, QuerySlot<K>>,
    keys: Vec<K>,
}

impl<K> QueryRouting<K> {
    pub fn slot(&self, key: EntryKey) -> Option<&QuerySlot<K>> {
        self.slots.get(&key)
    }

    /// All slots in wire key order, which is registration order.
    pub fn slots(&self) -> impl Iterator<Item = (EntryKey, &QuerySlot<K>)> {
        self.slots.iter().map(|(key, slot)| (*key, slot))
    }

    /// Distinct caller keys in order of first registration.
    pub fn caller_keys(&self) -> &[K] {
        &self.keys
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// Builders of one kind, ready to ship, plus their routing table.
#[derive(Debug, Clone)]
pub struct GradleInfoQueryMap<K> {
    builders: CustomSerializedMap,
    failures: BTreeMap<EntryKey, TransferableIssue>,
    routing: QueryRouting<K>,
}

impl<K: Clone + PartialEq> GradleInfoQueryMap<K> {
    /// Serializes every query's builder.
    ///
    /// A builder that cannot be serialized is kept out of the shipped map;
    /// its issue is reported for its slot when results are rehydrated.
    pub fn from_queries<Q: InfoQuery>(queries: &[(K, Vec<Q>)]) -> Self {
        let mut builders = CustomSerializedMap::builder();
        let mut failures = BTreeMap::new();
        let mut slots = BTreeMap::new();
        let mut keys = Vec::with_capacity(queries.len());
        let mut next = 0_u32;

        for (caller_key, key_queries) in queries {
            if !keys.contains(caller_key) {
                keys.push(caller_key.clone());
            }
            for (position, query) in key_queries.iter().enumerate() {
                let entry = EntryKey::new(next);
                next += 1;

                let builder_name = query.builder_name();
                match query.encode_builder() {
                    Ok(encoded) => builders.add_encoded(entry, encoded),
                    Err(err) => {
                        tracing::warn!("Cannot serialize builder '{}': {}", builder_name, err);
                        failures.insert(entry, TransferableIssue::from_error(&err));
                    }
                }
                slots.insert(
                    entry,
                    QuerySlot {
                        key: caller_key.clone(),
                        position,
                        classpath: query.classpath().clone(),
                        builder_name,
                    },
                );
            }
        }

        tracing::debug!(
            "flattened {} queries under {} keys ({} not serializable)",
            slots.len(),
            keys.len(),
            failures.len()
        );

        Self {
            builders: builders.create(),
            failures,
            routing: QueryRouting { slots, keys },
        }
    }
}

impl<K> GradleInfoQueryMap<K> {
    /// The map shipped into the daemon.
    pub fn serialized_builders(&self) -> &CustomSerializedMap {
        &self.builders
    }

    /// Builders that never left the IDE.
    pub fn serialization_failures(&self) -> impl Iterator<Item = (EntryKey, &TransferableIssue)> {
        self.failures.iter().map(|(key, issue)| (*key, issue))
    }

    pub fn serialization_failure(&self, key: EntryKey) -> Option<&TransferableIssue> {
        self.failures.get(&key)
    }

    pub fn routing(&self) -> &QueryRouting<K> {
        &self.routing
    }
}
