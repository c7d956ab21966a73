//! Split flat joined rows back into parents and child records.
//!
//! A joined query surfaces association columns under compound aliases
//! (`alias__column`). After execution each row splits into the parent's
//! own columns and, per tracked alias, a child record with the prefix
//! peeled off.

use indexmap::IndexMap;
use serde_json::Value;

/// One flat result row.
pub type Record = IndexMap<String, Value>;

/// The parents and per-alias children recovered from a joined result set.
#[derive(Debug, Clone, PartialEq, Default, serde::Serialize, serde::Deserialize)]
pub struct SplitRecords {
    pub parents: Vec<Record>,
    pub children: IndexMap<String, Vec<Record>>,
}

/// Split each record into a parent record and the child record embedded
/// under `{primary_key_attr}__` prefixed keys. Column order and row order
/// are preserved, and child rows are never deduplicated here; a cartesian
/// expansion upstream simply shows up as repeated children.
pub fn detect_children_records(primary_key_attr: &str, records: &[Record]) -> SplitRecords {
    let prefix = format!("{primary_key_attr}__");
    let mut split = SplitRecords::default();

    for record in records {
        let mut parent = Record::new();
        let mut child = Record::new();

        for (key, value) in record {
            // Only the first occurrence of the separator belongs to the
            // alias; the remainder may itself contain `__`.
            match key.strip_prefix(&prefix) {
                Some(rest) => {
                    child.insert(rest.to_string(), value.clone());
                }
                None => {
                    parent.insert(key.clone(), value.clone());
                }
            }
        }

        split.parents.push(parent);
        if !child.is_empty() {
            split
                .children
                .entry(primary_key_attr.to_string())
                .or_default()
                .push(child);
        }
    }

    split
}
