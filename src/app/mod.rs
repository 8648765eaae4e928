use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context as AnyhowContext;
use tracing::info;

use crate::config::Config;
use crate::db::Db;
use crate::rtc::RtcCore;

use self::context::AppContext;
use self::gateway::Gateway;
use self::lecture_engine::LectureEngine;
use self::room_registry::RoomRegistry;

////////////////////////////////////////////////////////////////////////////////

pub(crate) async fn run(config: Config, db: Db) -> anyhow::Result<()> {
    let rtc = Arc::new(RtcCore::new());

    let registry = Arc::new(RoomRegistry::new(db.clone()));
    registry.attach_rtc(rtc.clone());

    let engine = Arc::new(LectureEngine::new(
        db.clone(),
        registry.clone(),
        rtc.clone(),
    ));

    let gateway = Arc::new(Gateway::new(
        engine.clone(),
        registry.clone(),
        rtc.clone(),
    ));

    // Runtimes for every persisted room, then the admission gate rebuilt
    // from lectures that were in progress when the process went down.
    for room in registry.list_rooms() {
        rtc.setup_for_room(room.id);
    }

    engine.recover_lookup();

    let port = config.port;
    let context = Arc::new(AppContext::new(config, db, rtc, gateway));
    let router = http::build_router(context)?;

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    axum::Server::bind(&addr)
        .serve(router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server failed")?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install SIGINT handler");
    };

    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("shutdown signal received");
}

pub(crate) mod context;
pub(crate) mod endpoint;
pub(crate) mod error;
pub(crate) mod gateway;
pub(crate) mod http;
pub(crate) mod lecture_engine;
pub(crate) mod room_registry;
pub(crate) mod session;
