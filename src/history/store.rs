use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::history::record::{decode_records, HistoryFilters, HistoryPatch, HistoryRecord, NewHistoryRecord};
use crate::history::storage::KeyValueStore;
use crate::utils::HistoryError;

/// Key the collection is stored under.
pub const STORAGE_KEY: &str = "pixelshift_conversion_history";

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Checks that `id` is a positive integer.
pub fn validate_id(id: i64) -> Result<(), HistoryError> {
    if id <= 0 {
        return Err(HistoryError::invalid_id(id));
    }
    Ok(())
}

/// Parses user-supplied text into a history id.
pub fn parse_id(raw: &str) -> Result<i64, HistoryError> {
    let id = raw
        .trim()
        .parse::<i64>()
        .map_err(|_| HistoryError::invalid_id(raw.trim()))?;
    validate_id(id)?;
    Ok(id)
}

/// Local record of past conversions.
///
/// The collection lives in memory and is re-serialized in full under
/// [`STORAGE_KEY`] after every mutation. A failed write is reported to the
/// caller but the in-memory mutation stands.
pub struct HistoryStore {
    records: Vec<HistoryRecord>,
    next_id: i64,
    storage: Box<dyn KeyValueStore>,
    clock: Box<dyn Clock>,
}

impl HistoryStore {
    pub fn open(storage: impl KeyValueStore + 'static) -> Self {
        Self::with_clock(storage, SystemClock)
    }

    pub fn with_clock(storage: impl KeyValueStore + 'static, clock: impl Clock + 'static) -> Self {
        let records = storage.get(STORAGE_KEY).map(decode_records).unwrap_or_default();
        let next_id = records.iter().map(|r| r.id).max().unwrap_or(0) + 1;
        debug!("Loaded {} history records (next id {})", records.len(), next_id);

        Self {
            records,
            next_id,
            storage: Box::new(storage),
            clock: Box::new(clock),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// All records, newest first.
    pub fn get_all(&self) -> Vec<HistoryRecord> {
        let mut all = self.records.clone();
        sort_newest_first(&mut all);
        all
    }

    pub fn get(&self, id: i64) -> Result<Option<HistoryRecord>, HistoryError> {
        validate_id(id)?;
        Ok(self.records.iter().find(|r| r.id == id).cloned())
    }

    /// Appends a record with the next id and the current time.
    pub fn create(&mut self, data: NewHistoryRecord) -> Result<HistoryRecord, HistoryError> {
        let record = HistoryRecord {
            id: self.next_id,
            original_name: data.original_name,
            original_size: data.original_size,
            output_format: data.output_format,
            quality: data.quality,
            converted_size: data.converted_size,
            timestamp: self.clock.now(),
        };
        self.next_id += 1;
        self.records.push(record.clone());
        debug!("History record {} created for '{}'", record.id, record.original_name);

        self.persist()?;
        Ok(record)
    }

    /// Merges `patch` into record `id`, keeping its id and timestamp.
    pub fn update(&mut self, id: i64, patch: HistoryPatch) -> Result<HistoryRecord, HistoryError> {
        validate_id(id)?;
        let record = self
            .records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(HistoryError::NotFound(id))?;

        record.apply(patch);
        let updated = record.clone();

        self.persist()?;
        Ok(updated)
    }

    pub fn delete(&mut self, id: i64) -> Result<bool, HistoryError> {
        validate_id(id)?;
        let index = self
            .records
            .iter()
            .position(|r| r.id == id)
            .ok_or(HistoryError::NotFound(id))?;

        self.records.remove(index);
        self.persist()?;
        Ok(true)
    }

    /// Empties the collection and restarts ids at 1.
    pub fn clear(&mut self) -> Result<bool, HistoryError> {
        let dropped = self.records.len();
        self.records.clear();
        self.next_id = 1;
        info!("Conversion history cleared ({} records)", dropped);

        self.persist()?;
        Ok(true)
    }

    pub fn get_by_filters(&self, filters: &HistoryFilters) -> Vec<HistoryRecord> {
        let mut filtered: Vec<HistoryRecord> = self
            .records
            .iter()
            .filter(|r| filters.matches(r))
            .cloned()
            .collect();
        sort_newest_first(&mut filtered);
        filtered
    }

    fn persist(&mut self) -> Result<(), HistoryError> {
        let value = serde_json::to_value(&self.records)?;
        self.storage.set(STORAGE_KEY, value)
    }
}

/// Newest timestamp first; equal timestamps put the higher id first.
fn sort_newest_first(records: &mut [HistoryRecord]) {
    records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicI64, Ordering};

    use chrono::TimeZone;
    use serde_json::{json, Value};

    use super::*;
    use crate::history::storage::MemoryStore;
    use crate::utils::OutputFormat;

    /// Hands out timestamps from a script, one per `now()` call.
    struct ScriptedClock {
        seconds: Mutex<Vec<i64>>,
    }

    impl ScriptedClock {
        fn new(mut seconds: Vec<i64>) -> Self {
            seconds.reverse();
            Self { seconds: Mutex::new(seconds) }
        }
    }

    impl Clock for ScriptedClock {
        fn now(&self) -> DateTime<Utc> {
            let secs = self.seconds.lock().unwrap().pop().expect("clock script exhausted");
            Utc.timestamp_opt(secs, 0).unwrap()
        }
    }

    struct TickingClock(AtomicI64);

    impl Clock for TickingClock {
        fn now(&self) -> DateTime<Utc> {
            Utc.timestamp_opt(self.0.fetch_add(1, Ordering::SeqCst), 0).unwrap()
        }
    }

    struct FailingStore;

    impl KeyValueStore for FailingStore {
        fn get(&self, _key: &str) -> Option<Value> {
            None
        }

        fn set(&mut self, _key: &str, _value: Value) -> Result<(), HistoryError> {
            Err(HistoryError::storage("quota exceeded"))
        }
    }

    fn new_record(name: &str) -> NewHistoryRecord {
        NewHistoryRecord {
            original_name: name.to_string(),
            original_size: 1000,
            output_format: OutputFormat::Png,
            quality: 85,
            converted_size: 700,
        }
    }

    fn ticking() -> TickingClock {
        TickingClock(AtomicI64::new(1_700_000_000))
    }

    #[test]
    fn first_create_gets_id_one_and_ids_increase() {
        let mut store = HistoryStore::with_clock(MemoryStore::new(), ticking());
        assert_eq!(store.create(new_record("a.png")).unwrap().id, 1);
        assert_eq!(store.create(new_record("b.png")).unwrap().id, 2);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn clear_resets_ids() {
        let mut store = HistoryStore::with_clock(MemoryStore::new(), ticking());
        store.create(new_record("a.png")).unwrap();
        store.create(new_record("b.png")).unwrap();

        assert!(store.clear().unwrap());
        assert!(store.is_empty());
        assert_eq!(store.create(new_record("c.png")).unwrap().id, 1);
    }

    #[test]
    fn get_all_is_newest_first_for_any_insertion_order() {
        let clock = ScriptedClock::new(vec![300, 100, 200]);
        let mut store = HistoryStore::with_clock(MemoryStore::new(), clock);
        store.create(new_record("late.png")).unwrap();
        store.create(new_record("early.png")).unwrap();
        store.create(new_record("middle.png")).unwrap();

        let names: Vec<String> = store.get_all().into_iter().map(|r| r.original_name).collect();
        assert_eq!(names, vec!["late.png", "middle.png", "early.png"]);
    }

    #[test]
    fn equal_timestamps_sort_by_descending_id() {
        let clock = ScriptedClock::new(vec![100, 100, 100]);
        let mut store = HistoryStore::with_clock(MemoryStore::new(), clock);
        for name in ["a", "b", "c"] {
            store.create(new_record(name)).unwrap();
        }
        let ids: Vec<i64> = store.get_all().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![3, 2, 1]);
    }

    #[test]
    fn update_merges_fields_and_keeps_timestamp() {
        let mut store = HistoryStore::with_clock(MemoryStore::new(), ticking());
        let created = store.create(new_record("a.png")).unwrap();

        let updated = store
            .update(
                created.id,
                HistoryPatch {
                    quality: Some(40),
                    original_name: Some("renamed.png".into()),
                    timestamp: Some(Utc.timestamp_opt(0, 0).unwrap()),
                    ..Default::default()
                },
            )
            .unwrap();

        assert_eq!(updated.id, created.id);
        assert_eq!(updated.quality, 40);
        assert_eq!(updated.original_name, "renamed.png");
        assert_eq!(updated.timestamp, created.timestamp);
        assert_eq!(updated.converted_size, created.converted_size);
    }

    #[test]
    fn update_and_delete_validate_ids() {
        let mut store = HistoryStore::with_clock(MemoryStore::new(), ticking());
        store.create(new_record("a.png")).unwrap();

        assert!(matches!(store.update(42, HistoryPatch::default()), Err(HistoryError::NotFound(42))));
        assert!(matches!(store.delete(42), Err(HistoryError::NotFound(42))));
        assert!(matches!(store.update(0, HistoryPatch::default()), Err(HistoryError::InvalidId(_))));
        assert!(matches!(store.delete(-3), Err(HistoryError::InvalidId(_))));
        assert!(matches!(store.get(0), Err(HistoryError::InvalidId(_))));
    }

    #[test]
    fn parse_id_rejects_non_integers() {
        assert_eq!(parse_id(" 7 ").unwrap(), 7);
        assert!(matches!(parse_id("1.5"), Err(HistoryError::InvalidId(_))));
        assert!(matches!(parse_id("abc"), Err(HistoryError::InvalidId(_))));
        assert!(matches!(parse_id("0"), Err(HistoryError::InvalidId(_))));
    }

    #[test]
    fn delete_removes_only_that_record() {
        let mut store = HistoryStore::with_clock(MemoryStore::new(), ticking());
        store.create(new_record("a.png")).unwrap();
        store.create(new_record("b.png")).unwrap();

        assert!(store.delete(1).unwrap());
        assert_eq!(store.get(1).unwrap(), None);
        assert_eq!(store.get(2).unwrap().unwrap().original_name, "b.png");
        // Ids are not reused after a delete
        assert_eq!(store.create(new_record("c.png")).unwrap().id, 3);
    }

    #[test]
    fn reload_yields_identical_records() {
        let backing = MemoryStore::new();
        let mut store = HistoryStore::with_clock(backing.clone(), ticking());
        store.create(new_record("a.png")).unwrap();
        store.create(new_record("b.png")).unwrap();
        store.update(1, HistoryPatch { converted_size: Some(5), ..Default::default() }).unwrap();

        let reloaded = HistoryStore::open(backing);
        assert_eq!(reloaded.get_all(), store.get_all());
        assert_eq!(reloaded.next_id, 3);
    }

    #[test]
    fn loads_legacy_blob_and_continues_ids() {
        let mut backing = MemoryStore::new();
        backing
            .set(
                STORAGE_KEY,
                json!([
                    {"Id": 3, "originalName": "x.png", "outputFormat": "png", "quality": 85, "timestamp": "2026-01-01T00:00:00Z"},
                    {"originalName": "y.png", "outputFormat": "webp", "quality": 80, "timestamp": "2026-01-02T00:00:00Z"}
                ]),
            )
            .unwrap();

        let mut store = HistoryStore::with_clock(backing, ticking());
        assert_eq!(store.len(), 2);
        assert_eq!(store.get(2).unwrap().unwrap().original_name, "y.png");
        assert_eq!(store.create(new_record("z.png")).unwrap().id, 4);
    }

    #[test]
    fn filters_sort_newest_first() {
        let clock = ScriptedClock::new(vec![100, 300, 200]);
        let mut store = HistoryStore::with_clock(MemoryStore::new(), clock);
        store.create(new_record("cat.png")).unwrap();
        store.create(NewHistoryRecord { output_format: OutputFormat::Jpeg, ..new_record("dog.png") }).unwrap();
        store.create(new_record("Caterpillar.png")).unwrap();

        let cats = store.get_by_filters(&HistoryFilters { search: Some("CAT".into()), ..Default::default() });
        let names: Vec<&str> = cats.iter().map(|r| r.original_name.as_str()).collect();
        assert_eq!(names, vec!["Caterpillar.png", "cat.png"]);

        let jpegs = store.get_by_filters(&HistoryFilters { format: Some(OutputFormat::Jpeg), ..Default::default() });
        assert_eq!(jpegs.len(), 1);
        assert_eq!(jpegs[0].original_name, "dog.png");
    }

    #[test]
    fn write_failures_surface_but_keep_memory_state() {
        let mut store = HistoryStore::with_clock(FailingStore, ticking());
        let err = store.create(new_record("a.png")).unwrap_err();
        assert!(matches!(err, HistoryError::Storage(_)));
        assert_eq!(store.len(), 1);
    }
}
