//! Ordered tunnel set.

use crate::record::TunnelRecord;
use parking_lot::Mutex;
use std::sync::Arc;

/// An ordered collection of tunnel records, shared by reference so the same
/// record can live in more than one set at once (spec §3, §9: a tunnel in
/// the `active` set is the *same* record as in `cache`, not a copy).
///
/// Kept as a plain `Vec` rather than a map: sets stay small in practice (a
/// handful to a few hundred tunnels) and most operations already need a
/// linear scan by URL, so there is no map to keep in sync.
pub struct TunnelSet<H> {
    records: Vec<Arc<Mutex<TunnelRecord<H>>>>,
}

impl<H> TunnelSet<H> {
    pub fn new() -> Self {
        Self {
            records: Vec::with_capacity(16),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Mutex<TunnelRecord<H>>>> {
        self.records.iter()
    }

    /// Index of the record whose URL matches, if any.
    pub fn lookup(&self, url: &str) -> Option<usize> {
        self.records.iter().position(|r| r.lock().url == url)
    }

    /// Record whose URL matches, if any.
    pub fn find(&self, url: &str) -> Option<Arc<Mutex<TunnelRecord<H>>>> {
        self.lookup(url).map(|idx| self.records[idx].clone())
    }

    /// Append a new record. Returns the reference now shared by the set.
    pub fn insert(&mut self, record: TunnelRecord<H>) -> Arc<Mutex<TunnelRecord<H>>> {
        let shared = Arc::new(Mutex::new(record));
        self.records.push(shared.clone());
        shared
    }

    /// Append an already-shared record (used when the same record is being
    /// added to a second set, e.g. `cache` and `active`).
    pub fn insert_shared(&mut self, record: Arc<Mutex<TunnelRecord<H>>>) {
        self.records.push(record);
    }

    /// Replace the record at `url`, if present, with `record`. Returns the
    /// displaced record.
    pub fn replace(
        &mut self,
        url: &str,
        record: Arc<Mutex<TunnelRecord<H>>>,
    ) -> Option<Arc<Mutex<TunnelRecord<H>>>> {
        let idx = self.lookup(url)?;
        Some(std::mem::replace(&mut self.records[idx], record))
    }

    /// Remove the record at `url`, preserving the order of the remaining
    /// records. Returns the removed record.
    pub fn delete(&mut self, url: &str) -> Option<Arc<Mutex<TunnelRecord<H>>>> {
        let idx = self.lookup(url)?;
        Some(self.records.remove(idx))
    }

    /// Remove a record by identity (pointer equality), preserving order.
    pub fn delete_ref(&mut self, record: &Arc<Mutex<TunnelRecord<H>>>) -> bool {
        if let Some(idx) = self
            .records
            .iter()
            .position(|r| Arc::ptr_eq(r, record))
        {
            self.records.remove(idx);
            true
        } else {
            false
        }
    }
}

impl<H> Default for TunnelSet<H> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::TunnelId;
    use crate::record::INIT_AGE;

    fn rec(url: &str, id: u16) -> TunnelRecord<()> {
        TunnelRecord::new(url, TunnelId(id), INIT_AGE)
    }

    #[test]
    fn insert_then_lookup_finds_by_url() {
        let mut set = TunnelSet::new();
        set.insert(rec("cktp://a", 0));
        set.insert(rec("cktp://b", 1));
        assert_eq!(set.lookup("cktp://b"), Some(1));
        assert_eq!(set.lookup("cktp://missing"), None);
    }

    #[test]
    fn delete_preserves_order_of_remaining_records() {
        let mut set = TunnelSet::new();
        set.insert(rec("cktp://a", 0));
        set.insert(rec("cktp://b", 1));
        set.insert(rec("cktp://c", 2));
        set.delete("cktp://b");
        let urls: Vec<String> = set.iter().map(|r| r.lock().url.clone()).collect();
        assert_eq!(urls, vec!["cktp://a", "cktp://c"]);
    }

    #[test]
    fn shared_record_appears_identical_in_two_sets() {
        let mut cache = TunnelSet::new();
        let shared = cache.insert(rec("cktp://a", 0));
        let mut active = TunnelSet::new();
        active.insert_shared(shared.clone());
        shared.lock().age = 3;
        assert_eq!(active.find("cktp://a").unwrap().lock().age, 3);
    }

    #[test]
    fn replace_swaps_pointer_and_returns_displaced() {
        let mut set = TunnelSet::new();
        let original = set.insert(rec("cktp://a", 0));
        let replacement = Arc::new(Mutex::new(rec("cktp://a", 1)));
        let displaced = set.replace("cktp://a", replacement.clone()).unwrap();
        assert!(Arc::ptr_eq(&displaced, &original));
        assert!(Arc::ptr_eq(&set.find("cktp://a").unwrap(), &replacement));
    }
}
