//! HTTP control surface for the lecture lifecycle. Identity arrives in the
//! `X-User` header; the lifecycle semantics live in the engine, the
//! authorization in the gateway.

use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    Json,
};
use serde::Deserialize;

use crate::app::context::{AppContext, GlobalContext};
use crate::app::error::Error;
use crate::app::http::UserExtractor;
use crate::app::lecture_engine::{CreateEventOptions, ListEventsFilter, UpdateEventOptions};
use crate::db::{id::LectureId, lecture};
use crate::util;

///////////////////////////////////////////////////////////////////////////////

pub(crate) async fn create(
    Extension(context): Extension<Arc<AppContext>>,
    UserExtractor(user): UserExtractor,
    Json(options): Json<CreateEventOptions>,
) -> Result<Json<lecture::Object>, Error> {
    let gateway = context.gateway().clone();

    let lecture = util::spawn_blocking(move || gateway.schedule_lecture(&user, options)).await?;
    Ok(Json(lecture))
}

pub(crate) async fn list(
    Extension(context): Extension<Arc<AppContext>>,
    UserExtractor(user): UserExtractor,
    Query(filter): Query<ListEventsFilter>,
) -> Result<Json<Vec<lecture::Object>>, Error> {
    Ok(Json(context.gateway().list_lectures(&user, &filter)?))
}

pub(crate) async fn read(
    Extension(context): Extension<Arc<AppContext>>,
    UserExtractor(user): UserExtractor,
    Path(id): Path<String>,
) -> Result<Json<lecture::Object>, Error> {
    let lecture = context
        .gateway()
        .lecture_details(&user, &LectureId::new(id))?;

    Ok(Json(lecture))
}

pub(crate) async fn update(
    Extension(context): Extension<Arc<AppContext>>,
    UserExtractor(user): UserExtractor,
    Path(id): Path<String>,
    Json(options): Json<UpdateEventOptions>,
) -> Result<Json<lecture::Object>, Error> {
    let gateway = context.gateway().clone();

    let lecture = util::spawn_blocking(move || {
        gateway.update_lecture(&user, &LectureId::new(id), options)
    })
    .await?;

    Ok(Json(lecture))
}

#[derive(Debug, Deserialize)]
pub(crate) struct StatusRequest {
    status: lecture::Status,
}

pub(crate) async fn set_status(
    Extension(context): Extension<Arc<AppContext>>,
    UserExtractor(user): UserExtractor,
    Path(id): Path<String>,
    Json(request): Json<StatusRequest>,
) -> Result<Json<lecture::Object>, Error> {
    let gateway = context.gateway().clone();

    let lecture = util::spawn_blocking(move || {
        gateway.set_lecture_status(&user, &LectureId::new(id), request.status)
    })
    .await?;

    Ok(Json(lecture))
}

pub(crate) async fn cancel(
    Extension(context): Extension<Arc<AppContext>>,
    UserExtractor(user): UserExtractor,
    Path(id): Path<String>,
) -> Result<Json<lecture::Object>, Error> {
    let gateway = context.gateway().clone();

    let lecture =
        util::spawn_blocking(move || gateway.cancel_lecture(&user, &LectureId::new(id))).await?;

    Ok(Json(lecture))
}
