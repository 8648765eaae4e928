use std::sync::Arc;

use anyhow::anyhow;
use serde::Serialize;

use crate::app::error::{Error, ErrorExt, ErrorKind};
use crate::app::lecture_engine::{
    CreateEventOptions, LectureEngine, ListEventsFilter, UpdateEventOptions,
};
use crate::app::room_registry::{CreateRoomOptions, RoomRegistry};
use crate::db::{
    id::{LectureId, RoomId, UserId},
    lecture, room,
};
use crate::protocol::{Role, User};
use crate::rtc::{runtime::Participant, RtcCore};

////////////////////////////////////////////////////////////////////////////////

/// Error kinds the façade forwards untouched; everything else is wrapped
/// into the failing operation's lifecycle kind with the cause attached.
const PASSTHROUGH: &[ErrorKind] = &[
    ErrorKind::CommsNotInitialized,
    ErrorKind::EventNotFound,
    ErrorKind::EventValidationFailed,
    ErrorKind::Forbidden,
    ErrorKind::InvalidStatusTransition,
    ErrorKind::NoLectureActive,
    ErrorKind::NoLectureScheduled,
    ErrorKind::ParticipantNotFound,
    ErrorKind::ResourceAllocationFailed,
    ErrorKind::ResourceDeallocationFailed,
    ErrorKind::RoomFull,
    ErrorKind::RoomNotFound,
    ErrorKind::Unauthorized,
];

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RoomStatus {
    pub(crate) room: room::Object,
    pub(crate) participants: Vec<Participant>,
    pub(crate) available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) last_activity: Option<chrono::DateTime<chrono::Utc>>,
}

/// Authorization wrapper around the lifecycle engine, the room registry and
/// the RTC core's teacher controls. Identity is trusted from the caller.
pub(crate) struct Gateway {
    engine: Arc<LectureEngine>,
    registry: Arc<RoomRegistry>,
    rtc: Arc<RtcCore>,
}

impl Gateway {
    pub(crate) fn new(
        engine: Arc<LectureEngine>,
        registry: Arc<RoomRegistry>,
        rtc: Arc<RtcCore>,
    ) -> Self {
        Self {
            engine,
            registry,
            rtc,
        }
    }

    ////////////////////////////////////////////////////////////////////////////
    // Lectures

    pub(crate) fn schedule_lecture(
        &self,
        current_user: &User,
        options: CreateEventOptions,
    ) -> Result<lecture::Object, Error> {
        authorize(current_user)?;
        wrap(
            self.engine.create_event(options),
            ErrorKind::LectureSchedulingFailed,
        )
    }

    pub(crate) fn update_lecture(
        &self,
        current_user: &User,
        id: &LectureId,
        options: UpdateEventOptions,
    ) -> Result<lecture::Object, Error> {
        authorize(current_user)?;
        self.authorize_owner(current_user, id)?;
        wrap(
            self.engine.update_event(id, options),
            ErrorKind::LectureUpdateFailed,
        )
    }

    pub(crate) fn set_lecture_status(
        &self,
        current_user: &User,
        id: &LectureId,
        status: lecture::Status,
    ) -> Result<lecture::Object, Error> {
        authorize(current_user)?;
        self.authorize_owner(current_user, id)?;
        wrap(
            self.engine.update_event_status(id, status),
            ErrorKind::LectureUpdateFailed,
        )
    }

    pub(crate) fn cancel_lecture(
        &self,
        current_user: &User,
        id: &LectureId,
    ) -> Result<lecture::Object, Error> {
        authorize(current_user)?;
        self.authorize_owner(current_user, id)?;
        wrap(
            self.engine.cancel_event(id),
            ErrorKind::LectureCancellationFailed,
        )
    }

    pub(crate) fn list_lectures(
        &self,
        current_user: &User,
        filter: &ListEventsFilter,
    ) -> Result<Vec<lecture::Object>, Error> {
        authorize(current_user)?;
        wrap(
            Ok(self.engine.list_events(filter)),
            ErrorKind::LectureListFailed,
        )
    }

    pub(crate) fn lecture_details(
        &self,
        current_user: &User,
        id: &LectureId,
    ) -> Result<lecture::Object, Error> {
        authorize(current_user)?;
        wrap(self.engine.get_event(id), ErrorKind::LectureDetailsFailed)
    }

    ////////////////////////////////////////////////////////////////////////////
    // Rooms

    pub(crate) fn create_room(
        &self,
        current_user: &User,
        options: CreateRoomOptions,
    ) -> Result<room::Object, Error> {
        authorize(current_user)?;
        wrap(
            self.registry.create_room(options),
            ErrorKind::CommunicationSetupFailed,
        )
    }

    pub(crate) fn list_rooms(&self, current_user: &User) -> Result<Vec<room::Object>, Error> {
        authorize(current_user)?;
        Ok(self.registry.list_rooms())
    }

    pub(crate) fn delete_room(
        &self,
        current_user: &User,
        id: &RoomId,
    ) -> Result<(), Error> {
        authorize(current_user)?;
        self.registry.delete_room(id)
    }

    pub(crate) fn room_status(
        &self,
        current_user: &User,
        id: &RoomId,
    ) -> Result<RoomStatus, Error> {
        authorize(current_user)?;

        let room = wrap(self.registry.get_room(id), ErrorKind::ResourceStatusFailed)?;

        Ok(RoomStatus {
            participants: self.rtc.room_participants(id),
            available: self.rtc.is_room_available(id),
            last_activity: self.rtc.room_last_activity(id),
            room,
        })
    }

    ////////////////////////////////////////////////////////////////////////////
    // Teacher controls and resources

    pub(crate) fn mute_all_participants(
        &self,
        current_user: &User,
        room_id: &RoomId,
    ) -> Result<(), Error> {
        authorize(current_user)?;
        self.rtc.mute_all_participants(room_id, &current_user.id)
    }

    pub(crate) fn mute_participant(
        &self,
        current_user: &User,
        room_id: &RoomId,
        target: &UserId,
    ) -> Result<(), Error> {
        authorize(current_user)?;
        self.rtc.mute_participant(room_id, target, &current_user.id)
    }

    pub(crate) fn kick_participant(
        &self,
        current_user: &User,
        room_id: &RoomId,
        target: &UserId,
        reason: Option<String>,
    ) -> Result<(), Error> {
        authorize(current_user)?;
        self.rtc
            .kick_participant(room_id, target, &current_user.id, reason)
    }

    pub(crate) fn deallocate_resources(
        &self,
        current_user: &User,
        event_id: &str,
    ) -> Result<(), Error> {
        authorize(current_user)?;
        self.rtc.deallocate_resources(event_id)
    }

    ////////////////////////////////////////////////////////////////////////////

    /// Non-admin teachers may only touch their own lectures.
    fn authorize_owner(&self, current_user: &User, id: &LectureId) -> Result<(), Error> {
        if current_user.role == Role::Admin {
            return Ok(());
        }

        let lecture = self.engine.get_event(id)?;

        if lecture.teacher_id != current_user.id {
            return Err(anyhow!(
                "lecture '{}' belongs to teacher '{}'",
                id,
                lecture.teacher_id
            ))
            .error(ErrorKind::Forbidden);
        }

        Ok(())
    }
}

fn authorize(current_user: &User) -> Result<(), Error> {
    if !current_user.role.is_privileged() {
        return Err(anyhow!(
            "user '{}' with role '{:?}' may not manage lectures",
            current_user.id,
            current_user.role
        ))
        .error(ErrorKind::Unauthorized);
    }

    Ok(())
}

fn wrap<T>(result: Result<T, Error>, operation_kind: ErrorKind) -> Result<T, Error> {
    result.map_err(|err| {
        if PASSTHROUGH.contains(&err.kind()) {
            err
        } else {
            Error::new(operation_kind, anyhow::Error::from(err))
        }
    })
}

////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod test {
    use super::*;
    use crate::db::id::UserId;
    use crate::protocol::Role;
    use crate::test_helpers::context::TestContext;
    use crate::test_helpers::factory;

    fn options() -> CreateEventOptions {
        CreateEventOptions {
            name: "Algebra".to_owned(),
            date: "2025-01-01T10:00:00Z".parse().unwrap(),
            room_id: RoomId::new("test-room-1"),
            teacher_id: UserId::new("T1"),
            created_by: UserId::new("T1"),
            description: None,
            max_participants: None,
        }
    }

    #[test]
    fn students_are_unauthorized() {
        let context = TestContext::new();
        let student = factory::user("U1", Role::Student);

        let err = context
            .gateway
            .schedule_lecture(&student, options())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);

        let err = context.gateway.list_rooms(&student).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
    }

    #[test]
    fn teachers_may_only_touch_their_own_lectures() {
        let context = TestContext::new();
        let owner = factory::user("T1", Role::Teacher);
        let other = factory::user("T2", Role::Teacher);
        let admin = factory::user("A1", Role::Admin);

        let lecture = context
            .gateway
            .schedule_lecture(&owner, options())
            .expect("schedule");

        let err = context
            .gateway
            .cancel_lecture(&other, &lecture.id)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);

        context
            .gateway
            .update_lecture(
                &owner,
                &lecture.id,
                UpdateEventOptions {
                    name: Some("Algebra II".to_owned()),
                    ..UpdateEventOptions::default()
                },
            )
            .expect("own update");

        // Admins bypass ownership.
        context
            .gateway
            .cancel_lecture(&admin, &lecture.id)
            .expect("admin cancel");
    }

    #[test]
    fn validation_errors_pass_through_unwrapped() {
        let context = TestContext::new();
        let teacher = factory::user("T1", Role::Teacher);

        let err = context
            .gateway
            .schedule_lecture(
                &teacher,
                CreateEventOptions {
                    name: "ab".to_owned(),
                    ..options()
                },
            )
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::EventValidationFailed);
    }

    #[test]
    fn lifecycle_flows_through_the_gateway() {
        let context = TestContext::new();
        let teacher = factory::user("T1", Role::Teacher);

        let lecture = context
            .gateway
            .schedule_lecture(&teacher, options())
            .expect("schedule");

        context
            .gateway
            .set_lecture_status(&teacher, &lecture.id, lecture::Status::InProgress)
            .expect("start");

        let status = context
            .gateway
            .room_status(&teacher, &lecture.room_id)
            .expect("status");
        assert!(status.available);
        assert_eq!(status.room.status, room::Status::Occupied);

        let listed = context
            .gateway
            .list_lectures(&teacher, &ListEventsFilter::default())
            .expect("list");
        assert_eq!(listed.len(), 1);

        let details = context
            .gateway
            .lecture_details(&teacher, &lecture.id)
            .expect("details");
        assert_eq!(details.status, lecture::Status::InProgress);
    }

    #[test]
    fn unknown_lecture_details_are_event_not_found() {
        let context = TestContext::new();
        let teacher = factory::user("T1", Role::Teacher);

        let err = context
            .gateway
            .lecture_details(&teacher, &LectureId::new("lecture_404"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EventNotFound);
    }
}
