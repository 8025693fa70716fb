// src/domain/diff.rs

use crate::db::StateStore;
use crate::domain::listing::{parse_timestamp, value_as_i64, Listing};
use crate::errors::StoreError;
use serde_json::Value;
use std::collections::HashSet;
use tracing::{debug, warn};

/// How one observed listing relates to what the store knew about it.
#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    /// Not in the store before this observation.
    New(Listing),
    /// Known, and the price moved.
    Updated { listing: Listing, old_price: i64 },
    /// Known, same price. Only `last_seen` advanced.
    Unchanged(Listing),
}

impl Change {
    pub fn listing(&self) -> &Listing {
        match self {
            Change::New(l) | Change::Unchanged(l) => l,
            Change::Updated { listing, .. } => listing,
        }
    }
}

/// A stored listing that has not been observed for longer than the staleness
/// threshold and has been deleted from the store.
#[derive(Debug, Clone)]
pub struct Removal {
    pub id: String,
    pub last_seen: i64,
    pub first_seen: Option<i64>,
    /// Query group that claimed the listing, if recorded.
    pub group: Option<String>,
    /// Decoded record, when it still decodes.
    pub listing: Option<Listing>,
    pub record: String,
}

/// What can still be read from a stored record. A present id is known even
/// when its record is damaged or was written without some fields.
struct Prior {
    price: Option<i64>,
    first_seen: Option<i64>,
    group: Option<String>,
}

impl Prior {
    fn read(id: &str, record: &str) -> Self {
        if let Ok(prev) = Listing::from_storage_record(record) {
            return Prior {
                price: Some(prev.price),
                first_seen: Some(prev.first_seen),
                group: prev.group,
            };
        }

        warn!(id = %id, "stored record only partly readable");
        let value: Value = serde_json::from_str(record).unwrap_or(Value::Null);
        Prior {
            price: match value.get("price") {
                Some(Value::Null) => Some(0),
                Some(p) => value_as_i64(p),
                None => None,
            },
            first_seen: value.get("first_seen").and_then(parse_timestamp),
            group: stored_group(&value),
        }
    }
}

fn stored_group(value: &Value) -> Option<String> {
    value.get("group").and_then(Value::as_str).map(str::to_string)
}

/// Classifies every listing of one snapshot against the store and persists
/// the observation.
///
/// Every observed listing is written back, changed or not, so `last_seen`
/// always reflects the latest sighting. `first_seen` and `group` are carried
/// over from the stored record; `first_seen` restarts at `now` only when the
/// store has no readable one. Only ids absent from the store are `New`.
/// Only price movements count as updates; cosmetic edits stay `Unchanged`,
/// as does a stored record whose price cannot be read.
pub fn diff_snapshot(
    store: &mut dyn StateStore,
    snapshot: &[Listing],
    now: i64,
) -> Result<Vec<Change>, StoreError> {
    let mut seen = HashSet::new();
    let mut changes = Vec::with_capacity(snapshot.len());

    for observed in snapshot {
        if !seen.insert(observed.id.as_str()) {
            debug!(id = %observed.id, "duplicate id in snapshot, ignoring repeat");
            continue;
        }

        let mut listing = observed.clone();
        listing.last_seen = now;

        let change = match store.get(&listing.id)? {
            None => {
                listing.first_seen = now;
                Change::New(listing)
            }
            Some(record) => {
                let prior = Prior::read(&listing.id, &record);
                listing.first_seen = prior.first_seen.unwrap_or(now);
                if let Some(group) = prior.group {
                    listing.group = Some(group);
                }
                match prior.price {
                    Some(old_price) if old_price != listing.price => Change::Updated {
                        listing,
                        old_price,
                    },
                    _ => Change::Unchanged(listing),
                }
            }
        };

        let listing = change.listing();
        store.put(&listing.id, &listing.to_storage_record()?)?;
        changes.push(change);
    }

    Ok(changes)
}

/// Deletes every stored listing whose `last_seen` is older than
/// `staleness_secs` and returns what was deleted, ordered by id.
///
/// Entries whose `last_seen` cannot be read are left alone.
pub fn sweep_removed(
    store: &mut dyn StateStore,
    now: i64,
    staleness_secs: i64,
) -> Result<Vec<Removal>, StoreError> {
    let cutoff = now - staleness_secs;
    let entries = store.get_all()?;
    let mut removals = Vec::new();

    for (id, record) in entries {
        let value: Value = match serde_json::from_str(&record) {
            Ok(v) => v,
            Err(e) => {
                warn!(id = %id, error = %e, "stored record is not JSON, skipping removal check");
                continue;
            }
        };

        let Some(last_seen) = value.get("last_seen").and_then(parse_timestamp) else {
            warn!(id = %id, "stored record has no readable last_seen, skipping removal check");
            continue;
        };

        if last_seen >= cutoff {
            continue;
        }

        store.delete(&id)?;
        debug!(id = %id, last_seen, "deleted stale listing");

        removals.push(Removal {
            first_seen: value.get("first_seen").and_then(parse_timestamp),
            group: stored_group(&value),
            listing: Listing::from_storage_record(&record).ok(),
            id,
            last_seen,
            record,
        });
    }

    removals.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(removals)
}
