//! Range index: point-containment lookup over stored IPv4 ranges
//!
//! # Layout in the store
//!
//! ```text
//! georange:ranges            sorted index   score = range_min, member = record key
//! georange:range:<range_min> value          JSON-encoded RangeRecord
//! ```
//!
//! Ranges never overlap, so the range containing `ip`, if there is one, is
//! the one with the greatest `range_min <= ip`. A lookup is a single floor
//! query on the boundary index (O(log n)) followed by one payload read and a
//! check of `ip <= range_max`. An address that falls into a gap lands on the
//! preceding range, fails that check, and comes back as not found.
//!
//! # Writes
//!
//! [`RangeIndex::stage`] queues the payload and its boundary entry into the
//! same [`WriteBatch`], so they always reach the store together. A boundary
//! whose payload is missing is reported as [`GeoRangeError::Corrupt`].
//!
//! # Rebuilds
//!
//! [`RangeIndex::reset`] drops the boundary index only; payload records are
//! left to be overwritten by the next load or orphaned (see
//! [`RangeIndex::prune_orphans`]). A rebuild is not atomic:
//!
//! - after a reset, concurrent readers see a partially populated index until
//!   the load finishes;
//! - without a reset, readers see the union of old and new boundaries, and
//!   an old boundary that the new data does not overwrite stays reachable.

use crate::error::{GeoRangeError, Result};
use crate::range_record::RangeRecord;
use crate::store::{IndexEntry, OrderedStore, WriteBatch};
use log::info;
use std::collections::HashSet;
use std::net::{IpAddr, Ipv4Addr};

/// Key of the boundary index
pub const INDEX_KEY: &str = "georange:ranges";

/// Prefix of record payload keys
pub const RECORD_PREFIX: &str = "georange:range:";

/// Payload key for a range starting at `range_min`
pub fn record_key(range_min: u32) -> String {
    format!("{}{}", RECORD_PREFIX, range_min)
}

/// Range index over an [`OrderedStore`]
pub struct RangeIndex<S> {
    store: S,
}

impl<S: OrderedStore> RangeIndex<S> {
    /// Wrap a store
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// The backing store
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Give the store back
    pub fn into_store(self) -> S {
        self.store
    }

    /// Queue `record` into `batch`: payload first, then its boundary
    pub fn stage(&self, batch: &mut WriteBatch, record: &RangeRecord) -> Result<()> {
        let key = record_key(record.range_min);
        batch.set(key.clone(), record.encode()?);
        batch.index_add(INDEX_KEY, record.range_min, key);
        Ok(())
    }

    /// Insert a single record with its own commit
    pub fn insert(&self, record: &RangeRecord) -> Result<()> {
        let mut batch = WriteBatch::with_capacity(2);
        self.stage(&mut batch, record)?;
        self.store.commit(batch)
    }

    /// Commit a batch built with [`stage`](Self::stage)
    pub fn commit(&self, batch: WriteBatch) -> Result<()> {
        self.store.commit(batch)
    }

    /// Find the range containing `ip`
    pub fn lookup(&self, ip: u32) -> Result<Option<RangeRecord>> {
        let Some(entry) = self.store.index_floor(INDEX_KEY, ip)? else {
            return Ok(None);
        };
        let record = self.load(&entry)?;
        Ok(record.contains(ip).then_some(record))
    }

    /// Find the range containing an IPv4 address
    pub fn lookup_addr(&self, addr: Ipv4Addr) -> Result<Option<RangeRecord>> {
        self.lookup(u32::from(addr))
    }

    /// Find the range containing an address given as text
    ///
    /// Accepts dotted-quad IPv4 or a plain decimal integer. IPv4-mapped IPv6
    /// addresses (`::ffff:a.b.c.d`) are folded to IPv4; any other IPv6
    /// address is rejected.
    pub fn lookup_str(&self, query: &str) -> Result<Option<RangeRecord>> {
        let query = query.trim();
        if let Ok(numeric) = query.parse::<u32>() {
            return self.lookup(numeric);
        }
        match query.parse::<IpAddr>() {
            Ok(IpAddr::V4(v4)) => self.lookup_addr(v4),
            Ok(IpAddr::V6(v6)) => match v6.to_ipv4_mapped() {
                Some(v4) => self.lookup_addr(v4),
                None => Err(GeoRangeError::Unsupported(format!(
                    "{} is an IPv6 address; only IPv4 ranges are indexed",
                    query
                ))),
            },
            Err(_) => Err(GeoRangeError::Unsupported(format!(
                "{:?} is not an IPv4 address",
                query
            ))),
        }
    }

    /// Drop the boundary index ahead of a rebuild
    ///
    /// Returns whether there was an index to drop. Payload records stay.
    pub fn reset(&self) -> Result<bool> {
        let existed = self.store.delete(INDEX_KEY)?;
        info!(
            "Reset range index ({})",
            if existed { "dropped existing boundaries" } else { "was already empty" }
        );
        Ok(existed)
    }

    /// Number of boundaries (reachable ranges)
    pub fn len(&self) -> Result<usize> {
        self.store.index_len(INDEX_KEY)
    }

    /// True if no range is reachable
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Lowest range in the index
    pub fn first(&self) -> Result<Option<RangeRecord>> {
        self.store
            .index_first(INDEX_KEY)?
            .map(|entry| self.load(&entry))
            .transpose()
    }

    /// Highest range in the index
    pub fn last(&self) -> Result<Option<RangeRecord>> {
        self.store
            .index_last(INDEX_KEY)?
            .map(|entry| self.load(&entry))
            .transpose()
    }

    /// Delete payload records that no boundary points at
    ///
    /// Returns the number of records removed. Meant for maintenance after a
    /// reset-and-rebuild, not for use while a load is running.
    pub fn prune_orphans(&self) -> Result<usize> {
        let live: HashSet<String> = self
            .store
            .index_entries(INDEX_KEY)?
            .into_iter()
            .map(|entry| entry.member)
            .collect();

        let mut batch = WriteBatch::new();
        for key in self.store.keys(RECORD_PREFIX)? {
            if !live.contains(&key) {
                batch.delete(key);
            }
        }
        let removed = batch.len();
        self.store.commit(batch)?;
        info!("Pruned {} orphaned range records", removed);
        Ok(removed)
    }

    fn load(&self, entry: &IndexEntry) -> Result<RangeRecord> {
        let bytes = self.store.get(&entry.member)?.ok_or_else(|| {
            GeoRangeError::Corrupt(format!(
                "boundary {} points at missing record {}",
                entry.score, entry.member
            ))
        })?;
        let record = RangeRecord::decode(&bytes).map_err(|e| {
            GeoRangeError::Corrupt(format!("record {} does not decode: {}", entry.member, e))
        })?;
        if record.range_min != entry.score {
            return Err(GeoRangeError::Corrupt(format!(
                "record {} starts at {} but its boundary is {}",
                entry.member, record.range_min, entry.score
            )));
        }
        Ok(record)
    }
}
