use std::sync::Arc;

use crate::app::context::GlobalContext;
use crate::app::gateway::Gateway;
use crate::app::lecture_engine::LectureEngine;
use crate::app::room_registry::RoomRegistry;
use crate::config::Config;
use crate::db::Db;
use crate::rtc::RtcCore;

use super::db::TestDb;

/// The full service wiring over an isolated store, for tests.
pub(crate) struct TestContext {
    db: TestDb,
    config: Config,
    pub(crate) rtc: Arc<RtcCore>,
    pub(crate) registry: Arc<RoomRegistry>,
    pub(crate) engine: Arc<LectureEngine>,
    pub(crate) gateway: Arc<Gateway>,
}

impl TestContext {
    pub(crate) fn new() -> Self {
        Self::build(TestDb::new(), true)
    }

    /// Registry without an attached RTC core.
    pub(crate) fn detached() -> Self {
        Self::build(TestDb::new(), false)
    }

    /// Fresh wiring over the same store file, as after a restart.
    pub(crate) fn reopen(other: &TestContext) -> Self {
        Self::build(other.db.reopen(), true)
    }

    fn build(db: TestDb, attach_rtc: bool) -> Self {
        let rtc = Arc::new(RtcCore::new());

        let registry = Arc::new(RoomRegistry::new(db.db().clone()));

        if attach_rtc {
            registry.attach_rtc(rtc.clone());
        }

        let engine = Arc::new(LectureEngine::new(
            db.db().clone(),
            registry.clone(),
            rtc.clone(),
        ));

        let gateway = Arc::new(Gateway::new(
            engine.clone(),
            registry.clone(),
            rtc.clone(),
        ));

        Self {
            db,
            config: Config::default(),
            rtc,
            registry,
            engine,
            gateway,
        }
    }

    pub(crate) fn db(&self) -> &Db {
        self.db.db()
    }
}

impl GlobalContext for TestContext {
    fn config(&self) -> &Config {
        &self.config
    }

    fn db(&self) -> &Db {
        self.db.db()
    }

    fn rtc(&self) -> &Arc<RtcCore> {
        &self.rtc
    }

    fn gateway(&self) -> &Arc<Gateway> {
        &self.gateway
    }
}
