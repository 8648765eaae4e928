use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
    sync::atomic::{AtomicU64, Ordering},
    sync::Arc,
};

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use self::id::RoomId;

////////////////////////////////////////////////////////////////////////////////

#[derive(Debug, Error)]
pub(crate) enum StoreError {
    #[error("failed to read the store file: {0}")]
    Read(#[source] anyhow::Error),
    #[error("failed to write the store file: {0}")]
    Write(#[source] anyhow::Error),
}

/// On-disk shape of the store: one JSON document with both collections.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub(crate) struct Document {
    pub(crate) rooms: Vec<room::Object>,
    pub(crate) lectures: Vec<lecture::Object>,
}

////////////////////////////////////////////////////////////////////////////////

/// Handle to the single-file store.
///
/// The parsed document is the authoritative cache. Readers take an atomic
/// snapshot and never block; writers are serialized through one mutex and
/// publish the new document only after it has been flushed to disk via
/// tempfile + rename, so a crash can not leave a partially written file.
#[derive(Clone)]
pub(crate) struct Db {
    inner: Arc<Inner>,
}

struct Inner {
    path: PathBuf,
    cache: ArcSwap<Document>,
    write_lock: Mutex<()>,
    room_seq: AtomicU64,
    lecture_seq: AtomicU64,
}

impl Db {
    /// Opens the store at `path`, loading the existing document or seeding a
    /// fresh one. `seed_default_room` controls whether a missing file starts
    /// with the default room.
    pub(crate) fn open(path: impl AsRef<Path>, seed_default_room: bool) -> Result<Self, StoreError> {
        let path = path.as_ref().to_owned();

        let document = if path.exists() {
            let raw = fs::read_to_string(&path)
                .map_err(|err| StoreError::Read(anyhow::Error::from(err)))?;

            serde_json::from_str::<Document>(&raw)
                .map_err(|err| StoreError::Read(anyhow::Error::from(err)))?
        } else {
            let mut document = Document::default();

            if seed_default_room {
                document.rooms.push(room::Object::seed(RoomId::new(DEFAULT_ROOM_ID)));
            }

            if let Some(dir) = path.parent() {
                fs::create_dir_all(dir)
                    .map_err(|err| StoreError::Write(anyhow::Error::from(err)))?;
            }

            persist(&path, &document)?;
            document
        };

        let room_seq = max_id_suffix(document.rooms.iter().map(|r| r.id.as_str()), "room_");

        let lecture_seq =
            max_id_suffix(document.lectures.iter().map(|l| l.id.as_str()), "lecture_");

        Ok(Self {
            inner: Arc::new(Inner {
                path,
                cache: ArcSwap::from_pointee(document),
                write_lock: Mutex::new(()),
                room_seq: AtomicU64::new(room_seq),
                lecture_seq: AtomicU64::new(lecture_seq),
            }),
        })
    }

    /// Lock-free snapshot of the cached document.
    pub(crate) fn snapshot(&self) -> Arc<Document> {
        self.inner.cache.load_full()
    }

    /// Runs `mutate` against a copy of the document, flushes it to disk and
    /// publishes it to readers. Writers observe each other in commit order.
    pub(crate) fn commit<F, T>(&self, mutate: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut Document) -> T,
    {
        let _guard = self.inner.write_lock.lock();

        let mut document = Document::clone(&self.inner.cache.load());
        let out = mutate(&mut document);

        persist(&self.inner.path, &document)?;
        self.inner.cache.store(Arc::new(document));
        Ok(out)
    }

    pub(crate) fn next_room_id(&self) -> RoomId {
        let n = self.inner.room_seq.fetch_add(1, Ordering::SeqCst) + 1;
        RoomId::new(format!("room_{}", n))
    }

    pub(crate) fn next_lecture_id(&self) -> id::LectureId {
        let n = self.inner.lecture_seq.fetch_add(1, Ordering::SeqCst) + 1;
        id::LectureId::new(format!("lecture_{}", n))
    }
}

pub(crate) const DEFAULT_ROOM_ID: &str = "test-room-1";
pub(crate) const DEFAULT_STORE_PATH: &str = "data/db.json";

/// Whole-file atomic replacement: the document goes to a sibling tempfile
/// which is then renamed over the target.
fn persist(path: &Path, document: &Document) -> Result<(), StoreError> {
    let raw = serde_json::to_vec_pretty(document)
        .map_err(|err| StoreError::Write(anyhow::Error::from(err)))?;

    let tmp_path = path.with_extension("json.tmp");

    let result = fs::File::create(&tmp_path)
        .and_then(|mut file| {
            file.write_all(&raw)?;
            file.sync_all()
        })
        .and_then(|()| fs::rename(&tmp_path, path));

    result.map_err(|err| StoreError::Write(anyhow::Error::from(err)))
}

fn max_id_suffix<'a>(ids: impl Iterator<Item = &'a str>, prefix: &str) -> u64 {
    ids.filter_map(|id| id.strip_prefix(prefix))
        .filter_map(|suffix| suffix.parse::<u64>().ok())
        .max()
        .unwrap_or(0)
}

pub(crate) mod id;
pub(crate) mod lecture;
pub(crate) mod room;

////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod test {
    use chrono::Utc;

    use super::id::{LectureId, RoomId, UserId};
    use super::*;

    fn store_path(dir: &tempfile::TempDir) -> std::path::PathBuf {
        dir.path().join("db.json")
    }

    #[test]
    fn seeds_default_room_on_first_load() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let db = Db::open(store_path(&dir), true).expect("Failed to open store");

        let snapshot = db.snapshot();
        assert_eq!(snapshot.rooms.len(), 1);
        assert_eq!(snapshot.rooms[0].id, RoomId::new(DEFAULT_ROOM_ID));
        assert!(snapshot.lectures.is_empty());
    }

    #[test]
    fn skips_seeding_when_disabled() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let db = Db::open(store_path(&dir), false).expect("Failed to open store");

        assert!(db.snapshot().rooms.is_empty());
    }

    #[test]
    fn write_then_reopen_reads_the_same_document() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = store_path(&dir);

        {
            let db = Db::open(&path, true).expect("Failed to open store");

            let lecture = lecture::Object::new(
                LectureId::new("lecture_1"),
                "Algebra".to_owned(),
                Utc::now(),
                RoomId::new(DEFAULT_ROOM_ID),
                UserId::new("T1"),
                UserId::new("T1"),
            );

            db.commit(|doc| doc.lectures.push(lecture))
                .expect("Failed to commit");
        }

        let reopened = Db::open(&path, true).expect("Failed to reopen store");
        let snapshot = reopened.snapshot();

        assert_eq!(snapshot.rooms.len(), 1);
        assert_eq!(snapshot.lectures.len(), 1);
        assert_eq!(snapshot.lectures[0].id, LectureId::new("lecture_1"));
    }

    #[test]
    fn no_tempfile_left_behind_after_commit() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = store_path(&dir);

        let db = Db::open(&path, true).expect("Failed to open store");
        db.commit(|_| ()).expect("Failed to commit");

        assert!(path.exists());
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn id_counters_resume_after_existing_rows() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = store_path(&dir);

        {
            let db = Db::open(&path, true).expect("Failed to open store");

            let lecture = lecture::Object::new(
                LectureId::new("lecture_7"),
                "History".to_owned(),
                Utc::now(),
                RoomId::new(DEFAULT_ROOM_ID),
                UserId::new("T1"),
                UserId::new("T1"),
            );

            db.commit(|doc| doc.lectures.push(lecture))
                .expect("Failed to commit");
        }

        let db = Db::open(&path, true).expect("Failed to reopen store");
        assert_eq!(db.next_lecture_id(), LectureId::new("lecture_8"));
        assert_eq!(db.next_room_id(), RoomId::new("room_1"));
    }
}
