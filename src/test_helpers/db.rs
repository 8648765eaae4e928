use std::sync::Arc;

use crate::db::Db;

/// Isolated store on a temp dir. Cloning shares the dir so a second handle
/// can reopen the same file.
#[derive(Clone)]
pub(crate) struct TestDb {
    dir: Arc<tempfile::TempDir>,
    db: Db,
}

impl TestDb {
    pub(crate) fn new() -> Self {
        let dir = Arc::new(tempfile::tempdir().expect("Failed to create temp dir"));
        let db = Db::open(dir.path().join("db.json"), true).expect("Failed to open store");
        Self { dir, db }
    }

    /// A fresh handle over the same file, as after a process restart.
    pub(crate) fn reopen(&self) -> Self {
        let db =
            Db::open(self.dir.path().join("db.json"), true).expect("Failed to reopen store");

        Self {
            dir: self.dir.clone(),
            db,
        }
    }

    pub(crate) fn db(&self) -> &Db {
        &self.db
    }
}
