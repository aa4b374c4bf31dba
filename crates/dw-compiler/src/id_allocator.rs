use std::collections::BTreeMap;

use dw_core::{DictWikiError, MaxIdReport};
use tracing::info;

pub const ID_BLOCK_SIZE: i64 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct IdBlock {
    base: i64,
    current: i64,
}

impl IdBlock {
    fn seeded(max_id: i64) -> Self {
        Self {
            base: max_id - max_id.rem_euclid(ID_BLOCK_SIZE),
            current: max_id,
        }
    }

    fn fresh(base: i64) -> Self {
        Self {
            base,
            current: base,
        }
    }

    fn next(&mut self) -> Option<i64> {
        let next = self.current + 1;
        if next - self.base >= ID_BLOCK_SIZE {
            return None;
        }
        self.current = next;
        Some(next)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Bucket {
    LookupField,
    Resource,
}

/// Hands out block-of-1000 identifiers for lookup values (one block per
/// lookup field) and records (one block per resource).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdAllocator {
    running_max: i64,
    lookup_blocks: BTreeMap<String, IdBlock>,
    record_blocks: BTreeMap<String, IdBlock>,
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl IdAllocator {
    pub fn new() -> Self {
        Self {
            running_max: -1,
            lookup_blocks: BTreeMap::new(),
            record_blocks: BTreeMap::new(),
        }
    }

    pub fn from_report(report: &MaxIdReport) -> Self {
        Self {
            running_max: report.global_max(),
            lookup_blocks: report
                .max_lookup_ids
                .iter()
                .map(|(name, max_id)| (name.clone(), IdBlock::seeded(*max_id)))
                .collect(),
            record_blocks: report
                .max_record_ids
                .iter()
                .map(|(name, max_id)| (name.clone(), IdBlock::seeded(*max_id)))
                .collect(),
        }
    }

    pub fn allocate_lookup_value_id(&mut self, lookup_field: &str) -> Result<i64, DictWikiError> {
        self.block(Bucket::LookupField, lookup_field)
            .next()
            .ok_or_else(|| {
                DictWikiError::new(
                    "ID_BLOCK_EXHAUSTED",
                    format!(
                        "Lookup field \"{}\" already uses all {} lookup ids of its block.",
                        lookup_field,
                        ID_BLOCK_SIZE - 1
                    ),
                )
            })
    }

    pub fn allocate_lookup_field_id(&mut self, lookup_field: &str) -> i64 {
        self.block(Bucket::LookupField, lookup_field).base
    }

    pub fn allocate_record_id(&mut self, resource: &str) -> Result<i64, DictWikiError> {
        self.block(Bucket::Resource, resource).next().ok_or_else(|| {
            DictWikiError::new(
                "ID_BLOCK_EXHAUSTED",
                format!(
                    "Resource \"{}\" already uses all {} record ids of its block.",
                    resource,
                    ID_BLOCK_SIZE - 1
                ),
            )
        })
    }

    pub fn running_max(&self) -> i64 {
        self.running_max
    }

    fn block(&mut self, bucket: Bucket, key: &str) -> &mut IdBlock {
        let blocks = match bucket {
            Bucket::LookupField => &mut self.lookup_blocks,
            Bucket::Resource => &mut self.record_blocks,
        };
        let running_max = &mut self.running_max;
        blocks.entry(key.to_string()).or_insert_with(|| {
            let base = *running_max - running_max.rem_euclid(ID_BLOCK_SIZE) + ID_BLOCK_SIZE;
            *running_max = base;
            match bucket {
                Bucket::LookupField => {
                    info!("Creating base lookup field ID for '{}' with value {}", key, base)
                }
                Bucket::Resource => {
                    info!("Creating base record ID for resource '{}' with value {}", key, base)
                }
            }
            IdBlock::fresh(base)
        })
    }
}
