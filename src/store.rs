//! The paste store: the only owner of paste records.
//!
//! Expired pastes are removed two ways. Reads check the deadline and delete
//! an expired record before reporting it gone, so an expired paste is never
//! served. [`PasteStore::sweep`] removes expired records nobody reads again.
//! Both paths use the same conditional delete, so they may race freely.

use std::sync::Arc;

use chrono::{SubsecRound, Utc};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{StoreError, StoreResult};
use crate::ids::{IdGenerator, RandomIds};
use crate::models::{NewPaste, Paste, DEFAULT_LANGUAGE, DEFAULT_TITLE};
use crate::storage::Storage;

/// Number of ids tried before giving up on a create.
pub const MAX_ID_ATTEMPTS: usize = 5;

/// Result of one sweep pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Expired records found by the scan.
    pub scanned: usize,
    /// Records this pass deleted.
    pub removed: usize,
    /// Records whose deletion failed; they are picked up again next pass.
    pub failed: usize,
}

pub struct PasteStore<S> {
    inner: Arc<Inner<S>>,
}

struct Inner<S> {
    storage: S,
    ids: Box<dyn IdGenerator>,
    sweeping: Mutex<()>,
}

impl<S> Clone for PasteStore<S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<S: Storage> PasteStore<S> {
    pub fn new(storage: S) -> Self {
        Self::with_id_generator(storage, RandomIds)
    }

    pub fn with_id_generator(storage: S, ids: impl IdGenerator + 'static) -> Self {
        Self {
            inner: Arc::new(Inner {
                storage,
                ids: Box::new(ids),
                sweeping: Mutex::new(()),
            }),
        }
    }

    pub fn storage(&self) -> &S {
        &self.inner.storage
    }

    /// Create a paste under a fresh id.
    ///
    /// The paste is readable through [`PasteStore::get`] once this returns.
    pub async fn create(&self, new: NewPaste) -> StoreResult<Paste> {
        let content = new.content.trim();
        if content.is_empty() {
            return Err(StoreError::Validation("content must not be empty".into()));
        }

        let mut paste = Paste {
            id: String::new(),
            title: non_blank(new.title).unwrap_or_else(|| DEFAULT_TITLE.to_owned()),
            content: content.to_owned(),
            language: non_blank(new.language).unwrap_or_else(|| DEFAULT_LANGUAGE.to_owned()),
            created_at: Utc::now().trunc_subsecs(3),
            expires_at: new.expires_at.map(|deadline| deadline.trunc_subsecs(3)),
        };

        for attempt in 1..=MAX_ID_ATTEMPTS {
            paste.id = self.inner.ids.generate();
            if self.inner.storage.insert(&paste).await? {
                return Ok(paste);
            }
            warn!("paste id collision: id='{}', attempt={attempt}", paste.id);
        }

        Err(StoreError::IdSpaceExhausted {
            attempts: MAX_ID_ATTEMPTS,
        })
    }

    /// Get a live paste by id.
    ///
    /// An expired record is deleted and reported as [`StoreError::Gone`];
    /// later lookups of the same id get [`StoreError::NotFound`].
    pub async fn get(&self, id: &str) -> StoreResult<Paste> {
        let Some(paste) = self.inner.storage.fetch(id).await? else {
            return Err(StoreError::NotFound);
        };

        let now = Utc::now();
        if paste.is_live(&now) {
            return Ok(paste);
        }

        if self.inner.storage.delete_expired(id, now).await? {
            info!("deleted expired paste on read: id='{id}'");
        } else {
            debug!("expired paste already deleted: id='{id}'");
        }
        Err(StoreError::Gone)
    }

    /// Delete every record whose deadline has passed.
    ///
    /// Returns `None` without doing anything when another sweep is running.
    pub async fn sweep(&self) -> StoreResult<Option<SweepReport>> {
        let Ok(_running) = self.inner.sweeping.try_lock() else {
            debug!("sweep already in progress, skipping");
            return Ok(None);
        };

        let now = Utc::now();
        let expirable = self.inner.storage.scan_expirable(now).await?;

        let mut report = SweepReport {
            scanned: expirable.len(),
            ..SweepReport::default()
        };
        for (id, deadline) in expirable {
            match self.inner.storage.delete_expired(&id, now).await {
                Ok(true) => {
                    debug!("swept expired paste: id='{id}', expired_at={deadline}");
                    report.removed += 1;
                }
                // deleted by a read in the meantime
                Ok(false) => {}
                Err(e) => {
                    warn!("failed to delete expired paste '{id}': {e}");
                    report.failed += 1;
                }
            }
        }

        if report.removed > 0 {
            info!("swept {} expired pastes", report.removed);
        }

        Ok(Some(report))
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use std::collections::{HashSet, VecDeque};
    use std::future::Future;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration as StdDuration;

    use chrono::{DateTime, Duration};
    use parking_lot::Mutex as SyncMutex;

    use super::*;
    use crate::error::StorageError;
    use crate::storage::memory::MemoryStorage;
    use crate::storage::StorageResult;

    fn memory_store() -> PasteStore<MemoryStorage> {
        PasteStore::new(MemoryStorage::new())
    }

    fn new_paste(content: &str) -> NewPaste {
        NewPaste {
            content: content.into(),
            ..NewPaste::default()
        }
    }

    fn expiring(content: &str, expires_at: DateTime<Utc>) -> NewPaste {
        NewPaste {
            content: content.into(),
            expires_at: Some(expires_at),
            ..NewPaste::default()
        }
    }

    /// Hands out ids from a fixed list, then falls back to random ones.
    struct ScriptedIds(SyncMutex<VecDeque<&'static str>>);

    impl ScriptedIds {
        fn new(ids: &[&'static str]) -> Self {
            Self(SyncMutex::new(ids.iter().copied().collect()))
        }
    }

    impl IdGenerator for ScriptedIds {
        fn generate(&self) -> String {
            match self.0.lock().pop_front() {
                Some(id) => id.to_owned(),
                None => crate::ids::generate_id(),
            }
        }
    }

    /// Store behaviour shared by every storage backend.
    mod scenarios {
        use super::*;

        pub async fn round_trip<S: Storage>(storage: S) {
            let store = PasteStore::new(storage);
            let created = store
                .create(NewPaste {
                    title: Some("greeting".into()),
                    content: "  hello world\n".into(),
                    language: Some("markdown".into()),
                    expires_at: Some(Utc::now() + Duration::hours(1)),
                })
                .await
                .unwrap();

            assert_eq!(created.title, "greeting");
            assert_eq!(created.content, "hello world");
            assert_eq!(created.language, "markdown");
            assert_eq!(created.id.len(), crate::ids::ID_LENGTH);

            let fetched = store.get(&created.id).await.unwrap();
            assert_eq!(fetched, created);
        }

        pub async fn defaults_and_no_expiry<S: Storage>(storage: S) {
            let store = PasteStore::new(storage);
            let created = store
                .create(NewPaste {
                    content: "print('hi')".into(),
                    language: Some("python".into()),
                    ..NewPaste::default()
                })
                .await
                .unwrap();

            assert_eq!(created.title, DEFAULT_TITLE);
            assert_eq!(created.language, "python");
            assert_eq!(created.expires_at, None);

            for _ in 0..3 {
                assert_eq!(store.get(&created.id).await.unwrap(), created);
            }
            assert_eq!(store.sweep().await.unwrap().unwrap().removed, 0);
            assert_eq!(store.get(&created.id).await.unwrap(), created);
        }

        pub async fn gone_then_not_found<S: Storage>(storage: S) {
            let store = PasteStore::new(storage);
            let created = store
                .create(expiring("old news", Utc::now() - Duration::minutes(5)))
                .await
                .unwrap();

            assert!(matches!(store.get(&created.id).await, Err(StoreError::Gone)));
            assert!(matches!(
                store.get(&created.id).await,
                Err(StoreError::NotFound)
            ));
            assert_eq!(store.sweep().await.unwrap().unwrap().scanned, 0);
        }

        pub async fn expires_shortly_after_deadline<S: Storage>(storage: S) {
            let store = PasteStore::new(storage);
            let created = store
                .create(expiring("brief", Utc::now() + Duration::milliseconds(1)))
                .await
                .unwrap();

            tokio::time::sleep(StdDuration::from_millis(5)).await;

            assert!(matches!(store.get(&created.id).await, Err(StoreError::Gone)));
            assert!(matches!(
                store.get(&created.id).await,
                Err(StoreError::NotFound)
            ));
        }

        /// A deadline on the current millisecond is expired for the
        /// liveness check and for the storage's own delete.
        pub async fn deadline_at_current_millisecond<S: Storage>(storage: S) {
            let store = PasteStore::new(storage);
            let created = store
                .create(expiring("edge", Utc::now().trunc_subsecs(3)))
                .await
                .unwrap();

            assert!(matches!(store.get(&created.id).await, Err(StoreError::Gone)));
            assert!(matches!(
                store.get(&created.id).await,
                Err(StoreError::NotFound)
            ));
        }

        pub async fn sweep_then_not_found<S: Storage>(storage: S) {
            let store = PasteStore::new(storage);
            let expired = store
                .create(expiring("stale", Utc::now() + Duration::milliseconds(1)))
                .await
                .unwrap();
            let later = store
                .create(expiring("fresh", Utc::now() + Duration::hours(1)))
                .await
                .unwrap();
            let forever = store.create(new_paste("forever")).await.unwrap();

            tokio::time::sleep(StdDuration::from_millis(5)).await;

            let report = store.sweep().await.unwrap().unwrap();
            assert_eq!(
                report,
                SweepReport {
                    scanned: 1,
                    removed: 1,
                    failed: 0
                }
            );

            // already purged, so the read never sees it
            assert!(matches!(
                store.get(&expired.id).await,
                Err(StoreError::NotFound)
            ));
            assert_eq!(store.get(&later.id).await.unwrap(), later);
            assert_eq!(store.get(&forever.id).await.unwrap(), forever);
            assert_eq!(store.sweep().await.unwrap().unwrap(), SweepReport::default());
        }

        pub async fn colliding_ids_are_retried<S: Storage>(storage: S) {
            let store = PasteStore::with_id_generator(
                storage,
                ScriptedIds::new(&["AAAAAAAAAA", "AAAAAAAAAA", "AAAAAAAAAA", "BBBBBBBBBB"]),
            );

            let first = store.create(new_paste("first")).await.unwrap();
            let second = store.create(new_paste("second")).await.unwrap();

            assert_eq!(first.id, "AAAAAAAAAA");
            assert_eq!(second.id, "BBBBBBBBBB");
            assert_eq!(store.get("AAAAAAAAAA").await.unwrap().content, "first");
            assert_eq!(store.get("BBBBBBBBBB").await.unwrap().content, "second");
        }

        pub async fn expired_ids_are_not_reused<S: Storage>(storage: S) {
            let store = PasteStore::with_id_generator(
                storage,
                ScriptedIds::new(&["CCCCCCCCCC", "CCCCCCCCCC", "DDDDDDDDDD"]),
            );
            let stale = store
                .create(expiring("stale", Utc::now() - Duration::seconds(1)))
                .await
                .unwrap();
            let next = store.create(new_paste("next")).await.unwrap();

            assert_eq!(stale.id, "CCCCCCCCCC");
            assert_eq!(next.id, "DDDDDDDDDD");
            assert!(matches!(store.get(&stale.id).await, Err(StoreError::Gone)));
            assert_eq!(store.get(&next.id).await.unwrap(), next);
        }

        pub async fn id_retries_are_bounded<S: Storage>(storage: S) {
            let store = PasteStore::with_id_generator(
                storage,
                ScriptedIds::new(&["EEEEEEEEEE"; MAX_ID_ATTEMPTS + 1]),
            );
            store.create(new_paste("owner")).await.unwrap();

            let err = store.create(new_paste("loser")).await.unwrap_err();
            assert!(matches!(
                err,
                StoreError::IdSpaceExhausted {
                    attempts: MAX_ID_ATTEMPTS
                }
            ));
            assert_eq!(store.get("EEEEEEEEEE").await.unwrap().content, "owner");
        }
    }

    macro_rules! backend_tests {
        ($backend:ident, $storage:expr) => {
            mod $backend {
                use super::*;

                #[tokio::test]
                async fn create_then_get_returns_same_paste() {
                    scenarios::round_trip($storage).await;
                }

                #[tokio::test]
                async fn defaults_apply_and_paste_never_expires() {
                    scenarios::defaults_and_no_expiry($storage).await;
                }

                #[tokio::test]
                async fn past_deadline_is_gone_then_not_found() {
                    scenarios::gone_then_not_found($storage).await;
                }

                #[tokio::test]
                async fn paste_expires_shortly_after_deadline() {
                    scenarios::expires_shortly_after_deadline($storage).await;
                }

                #[tokio::test]
                async fn deadline_at_current_millisecond_is_gone() {
                    scenarios::deadline_at_current_millisecond($storage).await;
                }

                #[tokio::test]
                async fn sweep_removes_unread_expired_pastes() {
                    scenarios::sweep_then_not_found($storage).await;
                }

                #[tokio::test]
                async fn colliding_ids_are_retried() {
                    scenarios::colliding_ids_are_retried($storage).await;
                }

                #[tokio::test]
                async fn expired_but_unswept_id_is_not_reused() {
                    scenarios::expired_ids_are_not_reused($storage).await;
                }

                #[tokio::test]
                async fn id_retries_are_bounded() {
                    scenarios::id_retries_are_bounded($storage).await;
                }
            }
        };
    }

    backend_tests!(memory_backend, MemoryStorage::new());

    #[cfg(feature = "sqlite")]
    backend_tests!(
        sqlite_backend,
        crate::db::Database::connect("sqlite::memory:", 1)
            .await
            .unwrap()
    );

    #[tokio::test]
    async fn blank_title_and_language_fall_back_to_defaults() {
        let store = memory_store();
        let created = store
            .create(NewPaste {
                title: Some("   ".into()),
                content: "x".into(),
                language: Some("".into()),
                expires_at: None,
            })
            .await
            .unwrap();
        assert_eq!(created.title, DEFAULT_TITLE);
        assert_eq!(created.language, DEFAULT_LANGUAGE);
    }

    #[tokio::test]
    async fn unknown_languages_pass_through() {
        let store = memory_store();
        let created = store
            .create(NewPaste {
                content: "x".into(),
                language: Some("brainfuck++".into()),
                ..NewPaste::default()
            })
            .await
            .unwrap();
        assert_eq!(created.language, "brainfuck++");
    }

    #[tokio::test]
    async fn empty_content_is_rejected_and_not_stored() {
        let store = memory_store();
        for content in ["", "   ", "\n\t "] {
            let err = store.create(new_paste(content)).await.unwrap_err();
            assert!(matches!(err, StoreError::Validation(_)), "{err:?}");
        }
        assert!(store.storage().is_empty());
    }

    #[tokio::test]
    async fn unknown_id_is_not_found() {
        let store = memory_store();
        store.create(new_paste("something")).await.unwrap();
        assert!(matches!(
            store.get("nope000000").await,
            Err(StoreError::NotFound)
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_creates_never_share_ids() {
        // a tiny id space forces collisions between concurrent creates
        struct TinyIds;
        impl IdGenerator for TinyIds {
            fn generate(&self) -> String {
                use rand::Rng;
                format!("id{:08}", rand::thread_rng().gen_range(0..64))
            }
        }

        let store = PasteStore::with_id_generator(MemoryStorage::new(), TinyIds);
        let tasks: Vec<_> = (0..32)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move { store.create(new_paste(&format!("paste {i}"))).await })
            })
            .collect();

        let mut ids = HashSet::new();
        let mut created = 0;
        for task in tasks {
            match task.await.unwrap() {
                Ok(paste) => {
                    created += 1;
                    assert!(ids.insert(paste.id.clone()), "duplicate id {}", paste.id);
                    assert_eq!(store.get(&paste.id).await.unwrap(), paste);
                }
                Err(StoreError::IdSpaceExhausted { .. }) => {}
                Err(e) => panic!("unexpected error: {e:?}"),
            }
        }
        assert_eq!(store.storage().len(), created);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn reads_racing_sweeps_agree() {
        let store = memory_store();
        let mut ids = Vec::new();
        for i in 0..50 {
            let paste = store
                .create(expiring(&format!("stale {i}"), Utc::now() - Duration::seconds(1)))
                .await
                .unwrap();
            ids.push(paste.id);
        }

        let sweeper = {
            let store = store.clone();
            tokio::spawn(async move { store.sweep().await })
        };
        let readers: Vec<_> = ids
            .iter()
            .cloned()
            .map(|id| {
                let store = store.clone();
                tokio::spawn(async move { store.get(&id).await })
            })
            .collect();

        for reader in readers {
            match reader.await.unwrap() {
                Err(StoreError::Gone) | Err(StoreError::NotFound) => {}
                other => panic!("expired paste was readable: {other:?}"),
            }
        }
        sweeper.await.unwrap().unwrap();

        assert!(store.storage().is_empty());
        for id in ids {
            assert!(matches!(store.get(&id).await, Err(StoreError::NotFound)));
        }
    }

    /// Storage whose scan blocks until released, to hold a sweep open.
    struct GatedStorage {
        inner: MemoryStorage,
        gate: tokio::sync::Semaphore,
        scans: AtomicUsize,
    }

    impl Storage for GatedStorage {
        fn insert(&self, paste: &Paste) -> impl Future<Output = StorageResult<bool>> + Send {
            self.inner.insert(paste)
        }

        fn fetch(&self, id: &str) -> impl Future<Output = StorageResult<Option<Paste>>> + Send {
            self.inner.fetch(id)
        }

        fn delete_expired(
            &self,
            id: &str,
            now: DateTime<Utc>,
        ) -> impl Future<Output = StorageResult<bool>> + Send {
            self.inner.delete_expired(id, now)
        }

        async fn scan_expirable(
            &self,
            cutoff: DateTime<Utc>,
        ) -> StorageResult<Vec<(String, DateTime<Utc>)>> {
            self.scans.fetch_add(1, Ordering::SeqCst);
            let _permit = self.gate.acquire().await;
            self.inner.scan_expirable(cutoff).await
        }
    }

    #[tokio::test]
    async fn sweeps_never_overlap() {
        let store = PasteStore::new(GatedStorage {
            inner: MemoryStorage::new(),
            gate: tokio::sync::Semaphore::new(0),
            scans: AtomicUsize::new(0),
        });

        let first = {
            let store = store.clone();
            tokio::spawn(async move { store.sweep().await })
        };
        while store.storage().scans.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }

        // the first sweep is parked inside its scan
        assert_eq!(store.sweep().await.unwrap(), None);
        assert_eq!(store.storage().scans.load(Ordering::SeqCst), 1);

        store.storage().gate.add_permits(1);
        assert!(first.await.unwrap().unwrap().is_some());
    }

    /// Storage that fails every call.
    struct BrokenStorage;

    fn broken() -> StorageError {
        StorageError::Corrupt {
            id: "-".into(),
            reason: "backend unavailable".into(),
        }
    }

    impl Storage for BrokenStorage {
        async fn insert(&self, _paste: &Paste) -> StorageResult<bool> {
            Err(broken())
        }

        async fn fetch(&self, _id: &str) -> StorageResult<Option<Paste>> {
            Err(broken())
        }

        async fn delete_expired(&self, _id: &str, _now: DateTime<Utc>) -> StorageResult<bool> {
            Err(broken())
        }

        async fn scan_expirable(
            &self,
            _cutoff: DateTime<Utc>,
        ) -> StorageResult<Vec<(String, DateTime<Utc>)>> {
            Err(broken())
        }
    }

    #[tokio::test]
    async fn storage_failures_surface_as_storage_errors() {
        let store = PasteStore::new(BrokenStorage);
        assert!(matches!(
            store.create(new_paste("x")).await,
            Err(StoreError::Storage { .. })
        ));
        assert!(matches!(
            store.get("AAAAAAAAAA").await,
            Err(StoreError::Storage { .. })
        ));
        assert!(matches!(store.sweep().await, Err(StoreError::Storage { .. })));
    }
}
