use std::sync::Arc;

use crate::app::gateway::Gateway;
use crate::config::Config;
use crate::db::Db;
use crate::rtc::RtcCore;

///////////////////////////////////////////////////////////////////////////////

pub(crate) trait GlobalContext: Send + Sync + 'static {
    fn config(&self) -> &Config;
    fn db(&self) -> &Db;
    fn rtc(&self) -> &Arc<RtcCore>;
    fn gateway(&self) -> &Arc<Gateway>;
}

///////////////////////////////////////////////////////////////////////////////

#[derive(Clone)]
pub(crate) struct AppContext {
    config: Arc<Config>,
    db: Db,
    rtc: Arc<RtcCore>,
    gateway: Arc<Gateway>,
}

impl AppContext {
    pub(crate) fn new(config: Config, db: Db, rtc: Arc<RtcCore>, gateway: Arc<Gateway>) -> Self {
        Self {
            config: Arc::new(config),
            db,
            rtc,
            gateway,
        }
    }
}

impl GlobalContext for AppContext {
    fn config(&self) -> &Config {
        &self.config
    }

    fn db(&self) -> &Db {
        &self.db
    }

    fn rtc(&self) -> &Arc<RtcCore> {
        &self.rtc
    }

    fn gateway(&self) -> &Arc<Gateway> {
        &self.gateway
    }
}
