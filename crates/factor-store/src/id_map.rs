//! Raw ↔ inner id tables.
//!
//! The trainer numbers users and items `0..count` in the order it first saw
//! them. The mapping file records that numbering as
//! `{"users": {raw: inner}, "items": {raw: inner}}`. Keys are JSON strings, so
//! every key goes through `RawId::parse` on the way in: `"1"`, `"1.0"` and a
//! native `1` all land on the same entry, and lookups never need fallbacks.

use crate::error::{FactorStoreError, Result, io_error};
use data_loader::RawId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use tracing::debug;

/// Injective, dense mapping for one namespace
#[derive(Debug, Clone, Default)]
pub struct InnerIdTable {
    by_raw: HashMap<RawId, usize>,
    by_inner: Vec<RawId>,
}

impl InnerIdTable {
    /// Build a table from `(raw, inner)` pairs.
    ///
    /// Fails when two raw ids share an inner index, when one raw id appears
    /// twice, or when the inner indices leave a gap in `0..count`.
    pub fn from_pairs<I>(namespace: &str, pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (RawId, usize)>,
    {
        let malformed = |reason: String| FactorStoreError::MalformedMapping {
            namespace: namespace.to_string(),
            reason,
        };

        let pairs: Vec<(RawId, usize)> = pairs.into_iter().collect();
        let count = pairs.len();
        let mut slots: Vec<Option<RawId>> = vec![None; count];
        let mut by_raw = HashMap::with_capacity(count);

        for (raw, inner) in pairs {
            if inner >= count {
                return Err(malformed(format!(
                    "inner index {} out of range for {} entries",
                    inner, count
                )));
            }
            if let Some(existing) = &slots[inner] {
                return Err(malformed(format!(
                    "inner index {} assigned to both {} and {}",
                    inner, existing, raw
                )));
            }
            if by_raw.insert(raw.clone(), inner).is_some() {
                return Err(malformed(format!("raw id {} listed twice", raw)));
            }
            slots[inner] = Some(raw);
        }

        // `count` distinct indices below `count` cover the whole range
        let by_inner = slots.into_iter().flatten().collect();
        Ok(Self { by_raw, by_inner })
    }

    /// Number ids in the order given
    pub fn from_ordered(namespace: &str, ids: Vec<RawId>) -> Result<Self> {
        Self::from_pairs(namespace, ids.into_iter().enumerate().map(|(i, raw)| (raw, i)))
    }

    pub fn resolve(&self, raw: &RawId) -> Option<usize> {
        self.by_raw.get(raw).copied()
    }

    pub fn raw(&self, inner: usize) -> Option<&RawId> {
        self.by_inner.get(inner)
    }

    pub fn len(&self) -> usize {
        self.by_inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_inner.is_empty()
    }

    /// Raw ids in inner-index order
    pub fn iter(&self) -> impl Iterator<Item = (usize, &RawId)> {
        self.by_inner.iter().enumerate()
    }

    fn to_json_map(&self) -> BTreeMap<String, usize> {
        self.iter().map(|(inner, raw)| (raw.to_string(), inner)).collect()
    }
}

/// The two mapping tables the trainer produces
#[derive(Debug, Clone, Default)]
pub struct IdMap {
    users: InnerIdTable,
    items: InnerIdTable,
}

impl IdMap {
    pub fn new(users: InnerIdTable, items: InnerIdTable) -> Self {
        Self { users, items }
    }

    pub fn users(&self) -> &InnerIdTable {
        &self.users
    }

    pub fn items(&self) -> &InnerIdTable {
        &self.items
    }
}

/// Outcome of reading a mapping file
#[derive(Debug)]
pub enum MappingTables {
    Complete(IdMap),
    /// The file parsed but one namespace is absent
    MissingTable(&'static str),
}

#[derive(Serialize, Deserialize)]
struct MappingFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    users: Option<BTreeMap<String, usize>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    items: Option<BTreeMap<String, usize>>,
}

fn table_from_json(namespace: &str, raw: BTreeMap<String, usize>) -> Result<InnerIdTable> {
    InnerIdTable::from_pairs(
        namespace,
        raw.into_iter().map(|(key, inner)| (RawId::parse(&key), inner)),
    )
}

/// Read `{"users": {...}, "items": {...}}` from disk
pub fn load_mappings(path: &Path) -> Result<MappingTables> {
    let file = File::open(path).map_err(io_error(path))?;
    let parsed: MappingFile =
        serde_json::from_reader(BufReader::new(file)).map_err(|source| FactorStoreError::Json {
            path: path.to_path_buf(),
            source,
        })?;

    let Some(users) = parsed.users else {
        return Ok(MappingTables::MissingTable("users"));
    };
    let Some(items) = parsed.items else {
        return Ok(MappingTables::MissingTable("items"));
    };

    let users = table_from_json("users", users)?;
    let items = table_from_json("items", items)?;
    debug!(users = users.len(), items = items.len(), "Loaded id mappings");

    Ok(MappingTables::Complete(IdMap { users, items }))
}

/// Write both tables in the trainer's mapping format
pub fn write_mappings(path: &Path, map: &IdMap) -> Result<()> {
    let file = MappingFile {
        users: Some(map.users.to_json_map()),
        items: Some(map.items.to_json_map()),
    };
    let out = File::create(path).map_err(io_error(path))?;
    let mut writer = BufWriter::new(out);
    serde_json::to_writer(&mut writer, &file).map_err(|source| FactorStoreError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    writer.flush().map_err(io_error(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_keys_resolve() {
        let table = InnerIdTable::from_pairs(
            "items",
            vec![(RawId::parse("10"), 1), (RawId::parse("tt0114709"), 0)],
        )
        .unwrap();

        assert_eq!(table.resolve(&RawId::Int(10)), Some(1));
        assert_eq!(table.resolve(&RawId::parse("10.0")), Some(1));
        assert_eq!(table.resolve(&RawId::from(10.0)), Some(1));
        assert_eq!(table.resolve(&RawId::parse("tt0114709")), Some(0));
        assert_eq!(table.resolve(&RawId::Int(11)), None);
        assert_eq!(table.raw(0), Some(&RawId::Text("tt0114709".into())));
    }

    #[test]
    fn test_rejects_non_injective_and_gaps() {
        let duplicate_inner =
            InnerIdTable::from_pairs("items", vec![(RawId::Int(1), 0), (RawId::Int(2), 0)]);
        assert!(matches!(
            duplicate_inner,
            Err(FactorStoreError::MalformedMapping { .. })
        ));

        let gap = InnerIdTable::from_pairs("items", vec![(RawId::Int(1), 0), (RawId::Int(2), 2)]);
        assert!(gap.is_err());

        // "1" and "1.0" canonicalize to the same raw id
        let duplicate_raw = InnerIdTable::from_pairs(
            "users",
            vec![(RawId::parse("1"), 0), (RawId::parse("1.0"), 1)],
        );
        assert!(duplicate_raw.is_err());
    }

    #[test]
    fn test_mapping_file_round_trip_and_missing_table() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("svd_mappings.json");

        let map = IdMap::new(
            InnerIdTable::from_ordered("users", vec![RawId::Int(7)]).unwrap(),
            InnerIdTable::from_ordered("items", vec![RawId::Int(3), RawId::Int(1)]).unwrap(),
        );
        write_mappings(&path, &map).unwrap();

        match load_mappings(&path).unwrap() {
            MappingTables::Complete(loaded) => {
                assert_eq!(loaded.items().resolve(&RawId::Int(1)), Some(1));
                assert_eq!(loaded.users().len(), 1);
            }
            MappingTables::MissingTable(name) => panic!("unexpected missing table {}", name),
        }

        std::fs::write(&path, r#"{"users": {"7": 0}}"#).unwrap();
        assert!(matches!(
            load_mappings(&path).unwrap(),
            MappingTables::MissingTable("items")
        ));

        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(load_mappings(&path), Err(FactorStoreError::Json { .. })));
    }
}
