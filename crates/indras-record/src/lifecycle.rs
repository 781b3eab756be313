//! Record teardown and shared ownership
//!
//! A record carrying a `FreeNotify` value announces that name through the
//! process-wide free-note hook when it is dropped. Records are otherwise
//! plain owned values; [`SharedRecord`] adds counted sharing for callers
//! that hand one record to several owners.

use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard, RwLock};
use tracing::debug;

use crate::keys::FREE_NOTE;
use crate::record::Record;

type FreeNoteHook = Arc<dyn Fn(&str) + Send + Sync>;

static FREE_NOTE_HOOK: RwLock<Option<FreeNoteHook>> = parking_lot::const_rwlock(None);

/// Install the hook that receives `FreeNotify` names, replacing any previous one
pub fn set_free_note_hook<F>(hook: F)
where
    F: Fn(&str) + Send + Sync + 'static,
{
    *FREE_NOTE_HOOK.write() = Some(Arc::new(hook));
}

/// Remove the free-note hook; later notifications are dropped
pub fn clear_free_note_hook() {
    *FREE_NOTE_HOOK.write() = None;
}

/// Call the hook outside the lock so it may install, clear or drop records
fn post_free_note(name: &str) {
    debug!(name, "Posting free notification");
    let hook = FREE_NOTE_HOOK.read().clone();
    if let Some(hook) = hook {
        hook(name);
    }
}

impl Drop for Record {
    fn drop(&mut self) {
        if let Some(name) = self.get(FREE_NOTE) {
            post_free_note(name);
        }
    }
}

/// A record shared between several owners
///
/// The record is released, and any free notification posted, when the last
/// handle goes away.
#[derive(Debug, Clone)]
pub struct SharedRecord(Arc<Mutex<Record>>);

impl SharedRecord {
    pub fn new(record: Record) -> Self {
        Self(Arc::new(Mutex::new(record)))
    }

    /// Take another handle to the same record
    pub fn retain(&self) -> Self {
        self.clone()
    }

    /// Number of live handles
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.0)
    }

    pub fn lock(&self) -> MutexGuard<'_, Record> {
        self.0.lock()
    }

    /// Recover the record if this is the only handle
    pub fn try_unwrap(self) -> Result<Record, Self> {
        Arc::try_unwrap(self.0)
            .map(Mutex::into_inner)
            .map_err(Self)
    }
}

impl From<Record> for SharedRecord {
    fn from(record: Record) -> Self {
        Self::new(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::op::Op;

    #[test]
    fn test_shared_record_counts() {
        let shared = SharedRecord::new(Record::data());
        assert_eq!(shared.ref_count(), 1);

        let other = shared.retain();
        assert_eq!(shared.ref_count(), 2);
        other.lock().set("Host", Some("h1"), Op::NULL);
        assert_eq!(shared.lock().get("Host"), Some("h1"));

        let shared = shared.try_unwrap().unwrap_err();
        drop(other);
        assert_eq!(shared.ref_count(), 1);
        let record = shared.try_unwrap().unwrap();
        assert_eq!(record.get("Host"), Some("h1"));
    }

    /// Both tests below install the process-wide hook
    static HOOK_LOCK: Mutex<()> = parking_lot::const_mutex(());

    #[test]
    fn test_free_note_posts_once_per_record() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        static POSTED: AtomicUsize = AtomicUsize::new(0);
        const NAME: &str = "com.indras.record.lifecycle-unit";
        let _guard = HOOK_LOCK.lock();

        set_free_note_hook(|name| {
            if name == NAME {
                POSTED.fetch_add(1, Ordering::SeqCst);
            }
        });

        let mut data = Record::data();
        data.set(FREE_NOTE, Some(NAME), Op::NULL);
        let mut query = Record::query();
        query.set(FREE_NOTE, Some(NAME), Op::EQUAL);

        let copy = data.copy();
        drop(query);
        assert_eq!(POSTED.load(Ordering::SeqCst), 1);
        drop(data);
        assert_eq!(POSTED.load(Ordering::SeqCst), 2);

        let shared = SharedRecord::new(copy);
        let handle = shared.retain();
        drop(shared);
        assert_eq!(POSTED.load(Ordering::SeqCst), 2);
        drop(handle);
        assert_eq!(POSTED.load(Ordering::SeqCst), 3);

        drop(Record::data());
        assert_eq!(POSTED.load(Ordering::SeqCst), 3);

        clear_free_note_hook();
    }

    #[test]
    fn test_free_note_hook_may_reenter() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        static POSTED: AtomicUsize = AtomicUsize::new(0);
        const OUTER: &str = "com.indras.record.lifecycle-outer";
        const INNER: &str = "com.indras.record.lifecycle-inner";
        let _guard = HOOK_LOCK.lock();

        set_free_note_hook(|name| {
            match name {
                // releasing a record from inside the hook posts again
                OUTER => {
                    POSTED.fetch_add(1, Ordering::SeqCst);
                    let mut inner = Record::data();
                    inner.set(FREE_NOTE, Some(INNER), Op::NULL);
                }
                // the hook may also remove itself
                INNER => {
                    POSTED.fetch_add(1, Ordering::SeqCst);
                    clear_free_note_hook();
                }
                _ => {}
            }
        });

        let mut record = Record::data();
        record.set(FREE_NOTE, Some(OUTER), Op::NULL);
        let again = record.copy();
        drop(record);
        assert_eq!(POSTED.load(Ordering::SeqCst), 2);

        // cleared by the inner call
        drop(again);
        assert_eq!(POSTED.load(Ordering::SeqCst), 2);
    }
}
