use std::sync::Arc;

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::info;

use crate::app::error::{Error, ErrorExt, ErrorKind};
use crate::app::room_registry::RoomRegistry;
use crate::db::{
    id::{LectureId, RoomId, UserId},
    lecture, room, Db,
};
use crate::rtc::RtcCore;

////////////////////////////////////////////////////////////////////////////////

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CreateEventOptions {
    pub(crate) name: String,
    pub(crate) date: DateTime<Utc>,
    pub(crate) room_id: RoomId,
    pub(crate) teacher_id: UserId,
    pub(crate) created_by: UserId,
    #[serde(default)]
    pub(crate) description: Option<String>,
    #[serde(default)]
    pub(crate) max_participants: Option<u32>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UpdateEventOptions {
    #[serde(default)]
    pub(crate) name: Option<String>,
    #[serde(default)]
    pub(crate) date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub(crate) room_id: Option<RoomId>,
    #[serde(default)]
    pub(crate) description: Option<String>,
    #[serde(default)]
    pub(crate) max_participants: Option<u32>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ListEventsFilter {
    #[serde(default)]
    pub(crate) room_id: Option<RoomId>,
    #[serde(default)]
    pub(crate) teacher_id: Option<UserId>,
    #[serde(default)]
    pub(crate) status: Option<lecture::Status>,
}

////////////////////////////////////////////////////////////////////////////////

/// Owns lecture records and the lifecycle state machine. Transitions commit
/// to the store first and only then mirror into the registry and the RTC
/// core, so a mirror failure never loses the transition itself.
pub(crate) struct LectureEngine {
    db: Db,
    registry: Arc<RoomRegistry>,
    rtc: Arc<RtcCore>,
}

impl LectureEngine {
    pub(crate) fn new(db: Db, registry: Arc<RoomRegistry>, rtc: Arc<RtcCore>) -> Self {
        Self { db, registry, rtc }
    }

    pub(crate) fn create_event(
        &self,
        options: CreateEventOptions,
    ) -> Result<lecture::Object, Error> {
        validate_name(&options.name)?;

        if let Some(description) = &options.description {
            validate_description(description)?;
        }

        if let Some(max_participants) = options.max_participants {
            validate_max_participants(max_participants)?;
        }

        self.validate_room(&options.room_id)?;

        let mut object = lecture::Object::new(
            self.db.next_lecture_id(),
            options.name,
            options.date,
            options.room_id,
            options.teacher_id,
            options.created_by,
        );

        object.description = options.description;
        object.max_participants = options.max_participants;

        let inserted = lecture::InsertQuery::new(object).execute(&self.db)?;
        info!(lecture_id = %inserted.id, room_id = %inserted.room_id, "lecture scheduled");
        Ok(inserted)
    }

    pub(crate) fn get_event(&self, id: &LectureId) -> Result<lecture::Object, Error> {
        lecture::FindQuery::new()
            .id(id.clone())
            .execute(&self.db)
            .ok_or_else(|| anyhow!("no lecture '{}'", id))
            .error(ErrorKind::EventNotFound)
    }

    pub(crate) fn list_events(&self, filter: &ListEventsFilter) -> Vec<lecture::Object> {
        let mut query = lecture::ListQuery::new();

        if let Some(room_id) = &filter.room_id {
            query = query.room_id(room_id.clone());
        }

        if let Some(teacher_id) = &filter.teacher_id {
            query = query.teacher_id(teacher_id.clone());
        }

        if let Some(status) = filter.status {
            query = query.status(status);
        }

        query.execute(&self.db)
    }

    pub(crate) fn update_event(
        &self,
        id: &LectureId,
        options: UpdateEventOptions,
    ) -> Result<lecture::Object, Error> {
        if let Some(name) = &options.name {
            validate_name(name)?;
        }

        if let Some(description) = &options.description {
            validate_description(description)?;
        }

        if let Some(max_participants) = options.max_participants {
            validate_max_participants(max_participants)?;
        }

        if let Some(room_id) = &options.room_id {
            self.validate_room(room_id)?;
        }

        let patch = lecture::Patch {
            name: options.name,
            date: options.date,
            room_id: options.room_id,
            description: options.description,
            max_participants: options.max_participants,
            ..lecture::Patch::default()
        };

        lecture::UpdateQuery::new(id.clone(), patch)
            .execute(&self.db)?
            .ok_or_else(|| anyhow!("no lecture '{}'", id))
            .error(ErrorKind::EventNotFound)
    }

    pub(crate) fn cancel_event(&self, id: &LectureId) -> Result<lecture::Object, Error> {
        self.update_event_status(id, lecture::Status::Cancelled)
    }

    /// The core transition: validates against the table, persists the status
    /// and timing fields, then mirrors into the room record and the RTC
    /// core's lecture lookup.
    pub(crate) fn update_event_status(
        &self,
        id: &LectureId,
        new_status: lecture::Status,
    ) -> Result<lecture::Object, Error> {
        let current = self.get_event(id)?;

        if !current.status.may_transition_to(new_status) {
            return Err(anyhow!(
                "transition {} -> {} is not allowed",
                current.status,
                new_status
            ))
            .error(ErrorKind::InvalidStatusTransition);
        }

        let now = Utc::now();

        let mut patch = lecture::Patch {
            status: Some(new_status),
            ..lecture::Patch::default()
        };

        if new_status == lecture::Status::InProgress && current.start_time.is_none() {
            patch.start_time = Some(now);
        }

        if new_status == lecture::Status::Completed && current.end_time.is_none() {
            patch.end_time = Some(now);
        }

        let updated = lecture::UpdateQuery::new(id.clone(), patch)
            .execute(&self.db)?
            .ok_or_else(|| anyhow!("no lecture '{}'", id))
            .error(ErrorKind::EventNotFound)?;

        info!(
            lecture_id = %updated.id,
            from = %current.status,
            to = %new_status,
            "lecture status changed"
        );

        self.mirror_transition(&updated, new_status)?;
        Ok(updated)
    }

    /// Committed-then-mirrored: failures here propagate, but the store
    /// already holds the new status and the lookup is rebuilt on restart.
    fn mirror_transition(
        &self,
        updated: &lecture::Object,
        new_status: lecture::Status,
    ) -> Result<(), Error> {
        match new_status {
            lecture::Status::InProgress => {
                self.rtc.register_lecture(
                    updated.id.clone(),
                    updated.room_id.clone(),
                    new_status.into(),
                );

                self.registry
                    .mark_room_occupied(updated)
                    .map_err(|err| {
                        Error::new(
                            ErrorKind::ResourceAllocationFailed,
                            anyhow::Error::from(err),
                        )
                    })?;

                self.rtc.allocate_resources(&updated.id);
            }
            lecture::Status::Delayed => {
                self.rtc.update_lecture_status(&updated.id, new_status.into());
            }
            lecture::Status::Completed | lecture::Status::Cancelled => {
                self.rtc.clear_room(&updated.room_id);
                self.rtc.unregister_lecture(&updated.id);

                self.registry.release_room(&updated.room_id).map_err(|err| {
                    Error::new(
                        ErrorKind::ResourceDeallocationFailed,
                        anyhow::Error::from(err),
                    )
                })?;
            }
            lecture::Status::Scheduled => {}
        }

        Ok(())
    }

    /// Rebuilds the lecture lookup from persisted state. Run once at boot.
    pub(crate) fn recover_lookup(&self) {
        let in_progress = lecture::ListQuery::new()
            .status(lecture::Status::InProgress)
            .execute(&self.db);

        for lecture in in_progress {
            info!(lecture_id = %lecture.id, room_id = %lecture.room_id, "recovering in-progress lecture");

            self.rtc.register_lecture(
                lecture.id.clone(),
                lecture.room_id.clone(),
                lecture.status.into(),
            );
        }
    }

    fn validate_room(&self, room_id: &RoomId) -> Result<(), Error> {
        room::FindQuery::new()
            .id(room_id.clone())
            .execute(&self.db)
            .map(|_| ())
            .ok_or_else(|| anyhow!("room '{}' does not exist", room_id))
            .error(ErrorKind::EventValidationFailed)
    }
}

fn validate_name(name: &str) -> Result<(), Error> {
    if !lecture::NAME_LEN.contains(&name.chars().count()) {
        return Err(anyhow!(
            "name must be {}..={} characters, got {}",
            lecture::NAME_LEN.start(),
            lecture::NAME_LEN.end(),
            name.chars().count()
        ))
        .error(ErrorKind::EventValidationFailed);
    }

    Ok(())
}

fn validate_description(description: &str) -> Result<(), Error> {
    if !lecture::DESCRIPTION_LEN.contains(&description.chars().count()) {
        return Err(anyhow!(
            "description must be {}..={} characters, got {}",
            lecture::DESCRIPTION_LEN.start(),
            lecture::DESCRIPTION_LEN.end(),
            description.chars().count()
        ))
        .error(ErrorKind::EventValidationFailed);
    }

    Ok(())
}

fn validate_max_participants(max_participants: u32) -> Result<(), Error> {
    if !lecture::MAX_PARTICIPANTS.contains(&max_participants) {
        return Err(anyhow!(
            "maxParticipants must be {}..={}, got {}",
            lecture::MAX_PARTICIPANTS.start(),
            lecture::MAX_PARTICIPANTS.end(),
            max_participants
        ))
        .error(ErrorKind::EventValidationFailed);
    }

    Ok(())
}

////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod test {
    use super::*;
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
    fn create_assigns_monotonic_ids_and_scheduled_status() {
        let context = TestContext::new();

        let first = context.engine.create_event(options()).expect("create");
        let second = context.engine.create_event(options()).expect("create");

        assert_eq!(first.id, LectureId::new("lecture_1"));
        assert_eq!(second.id, LectureId::new("lecture_2"));
        assert_eq!(first.status, lecture::Status::Scheduled);
        assert_eq!(first.kind, "lecture");
        assert!(first.start_time.is_none() && first.end_time.is_none());
    }

    #[test]
    fn create_validates_the_inputs() {
        let context = TestContext::new();

        let too_short = CreateEventOptions {
            name: "Al".to_owned(),
            ..options()
        };
        let err = context.engine.create_event(too_short).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EventValidationFailed);

        let too_long = CreateEventOptions {
            name: "x".repeat(101),
            ..options()
        };
        let err = context.engine.create_event(too_long).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EventValidationFailed);

        let short_description = CreateEventOptions {
            description: Some("too short".to_owned()),
            ..options()
        };
        let err = context.engine.create_event(short_description).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EventValidationFailed);

        let zero_participants = CreateEventOptions {
            max_participants: Some(0),
            ..options()
        };
        let err = context.engine.create_event(zero_participants).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EventValidationFailed);

        let unknown_room = CreateEventOptions {
            room_id: RoomId::new("nope"),
            ..options()
        };
        let err = context.engine.create_event(unknown_room).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EventValidationFailed);
    }

    #[test]
    fn boundary_lengths_are_accepted() {
        let context = TestContext::new();

        let boundary = CreateEventOptions {
            name: "abc".to_owned(),
            description: Some("x".repeat(10)),
            max_participants: Some(100),
            ..options()
        };

        context.engine.create_event(boundary).expect("create");

        let upper = CreateEventOptions {
            name: "x".repeat(100),
            description: Some("x".repeat(500)),
            max_participants: Some(1),
            ..options()
        };

        context.engine.create_event(upper).expect("create");
    }

    #[test]
    fn start_transition_sets_start_time_and_occupies_the_room() {
        let context = TestContext::new();
        let lecture = context.engine.create_event(options()).expect("create");

        let started = context
            .engine
            .update_event_status(&lecture.id, lecture::Status::InProgress)
            .expect("transition");

        assert_eq!(started.status, lecture::Status::InProgress);
        assert!(started.start_time.is_some());

        assert!(context.rtc.is_room_available(&started.room_id));

        let room = context.registry.get_room(&started.room_id).unwrap();
        assert_eq!(room.status, room::Status::Occupied);

        let current = room.current_lecture.expect("currentLecture missing");
        assert_eq!(current.id, started.id);
        assert_eq!(current.status, lecture::Status::InProgress);
    }

    #[test]
    fn completion_sets_end_time_and_releases_the_room() {
        let context = TestContext::new();
        let lecture = context.engine.create_event(options()).expect("create");

        context
            .engine
            .update_event_status(&lecture.id, lecture::Status::InProgress)
            .expect("transition");

        let completed = context
            .engine
            .update_event_status(&lecture.id, lecture::Status::Completed)
            .expect("transition");

        assert_eq!(completed.status, lecture::Status::Completed);
        assert!(completed.end_time.is_some());
        assert!(completed.end_time.unwrap() >= completed.start_time.unwrap());

        assert!(!context.rtc.is_room_available(&completed.room_id));

        let room = context.registry.get_room(&completed.room_id).unwrap();
        assert_eq!(room.status, room::Status::Available);
        assert!(room.current_lecture.is_none());
    }

    #[test]
    fn delayed_updates_the_lookup_only() {
        let context = TestContext::new();
        let lecture = context.engine.create_event(options()).expect("create");

        let delayed = context
            .engine
            .update_event_status(&lecture.id, lecture::Status::Delayed)
            .expect("transition");

        assert_eq!(delayed.status, lecture::Status::Delayed);
        assert!(delayed.start_time.is_none());
        assert!(!context.rtc.is_room_available(&delayed.room_id));

        // Delayed lectures still start.
        let started = context
            .engine
            .update_event_status(&lecture.id, lecture::Status::InProgress)
            .expect("transition");
        assert!(started.start_time.is_some());
    }

    #[test]
    fn illegal_transitions_are_rejected() {
        let context = TestContext::new();
        let lecture = context.engine.create_event(options()).expect("create");

        let err = context
            .engine
            .update_event_status(&lecture.id, lecture::Status::Completed)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidStatusTransition);

        context
            .engine
            .update_event_status(&lecture.id, lecture::Status::Cancelled)
            .expect("transition");

        for next in [
            lecture::Status::Scheduled,
            lecture::Status::InProgress,
            lecture::Status::Completed,
        ] {
            let err = context
                .engine
                .update_event_status(&lecture.id, next)
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidStatusTransition);
        }
    }

    #[test]
    fn cancel_event_releases_the_room() {
        let context = TestContext::new();
        let lecture = context.engine.create_event(options()).expect("create");

        context
            .engine
            .update_event_status(&lecture.id, lecture::Status::InProgress)
            .expect("transition");

        let cancelled = context.engine.cancel_event(&lecture.id).expect("cancel");
        assert_eq!(cancelled.status, lecture::Status::Cancelled);
        assert!(cancelled.end_time.is_none());

        let room = context.registry.get_room(&cancelled.room_id).unwrap();
        assert_eq!(room.status, room::Status::Available);
    }

    #[test]
    fn update_event_patches_without_touching_status() {
        let context = TestContext::new();
        let lecture = context.engine.create_event(options()).expect("create");

        let updated = context
            .engine
            .update_event(
                &lecture.id,
                UpdateEventOptions {
                    name: Some("Linear Algebra".to_owned()),
                    max_participants: Some(50),
                    ..UpdateEventOptions::default()
                },
            )
            .expect("update");

        assert_eq!(updated.name, "Linear Algebra");
        assert_eq!(updated.max_participants, Some(50));
        assert_eq!(updated.status, lecture::Status::Scheduled);

        let err = context
            .engine
            .update_event(
                &lecture.id,
                UpdateEventOptions {
                    name: Some("ab".to_owned()),
                    ..UpdateEventOptions::default()
                },
            )
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EventValidationFailed);
    }

    #[test]
    fn list_events_filters_conjunctively() {
        let context = TestContext::new();

        context.engine.create_event(options()).expect("create");

        let other_teacher = CreateEventOptions {
            teacher_id: UserId::new("T2"),
            ..options()
        };
        context.engine.create_event(other_teacher).expect("create");

        let all = context.engine.list_events(&ListEventsFilter::default());
        assert_eq!(all.len(), 2);

        let filtered = context.engine.list_events(&ListEventsFilter {
            teacher_id: Some(UserId::new("T1")),
            status: Some(lecture::Status::Scheduled),
            ..ListEventsFilter::default()
        });
        assert_eq!(filtered.len(), 1);
    }

    #[test]
    fn recovery_replays_in_progress_lectures() {
        let context = TestContext::new();
        let lecture = context.engine.create_event(options()).expect("create");

        context
            .engine
            .update_event_status(&lecture.id, lecture::Status::InProgress)
            .expect("transition");

        // A fresh core knows nothing until recovery runs.
        let rebuilt = TestContext::reopen(&context);
        assert!(!rebuilt.rtc.is_room_available(&lecture.room_id));

        rebuilt.engine.recover_lookup();
        assert!(rebuilt.rtc.is_room_available(&lecture.room_id));
    }

    #[test]
    fn completed_lectures_carry_consistent_timing() {
        let context = TestContext::new();

        let lecture = context.engine.create_event(options()).expect("create");
        context
            .engine
            .update_event_status(&lecture.id, lecture::Status::Delayed)
            .expect("transition");
        context
            .engine
            .update_event_status(&lecture.id, lecture::Status::InProgress)
            .expect("transition");
        let done = context
            .engine
            .update_event_status(&lecture.id, lecture::Status::Completed)
            .expect("transition");

        let (start, end) = (done.start_time.unwrap(), done.end_time.unwrap());
        assert!(end >= start);

        let reread = context.engine.get_event(&lecture.id).expect("get");
        assert_eq!(reread.start_time, done.start_time);
        assert_eq!(reread.end_time, done.end_time);
    }

    #[test]
    fn unknown_lecture_is_event_not_found() {
        let context = TestContext::new();

        let err = context
            .engine
            .get_event(&LectureId::new("lecture_404"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EventNotFound);

        let err = context
            .engine
            .update_event_status(&LectureId::new("lecture_404"), lecture::Status::Cancelled)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EventNotFound);
    }

    #[test]
    fn active_participants_are_dropped_when_the_lecture_ends() {
        let context = TestContext::new();
        let lecture = context.engine.create_event(options()).expect("create");

        context
            .engine
            .update_event_status(&lecture.id, lecture::Status::InProgress)
            .expect("transition");

        let mut peer = crate::test_helpers::peer::TestPeer::join(
            &context.rtc,
            lecture.room_id.clone(),
            factory::user("U1", crate::protocol::Role::Student),
        );
        peer.events();

        context
            .engine
            .update_event_status(&lecture.id, lecture::Status::Completed)
            .expect("transition");

        let events = peer.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0]["event"], "room_cleared");
        assert!(context.rtc.room_participants(&lecture.room_id).is_empty());
    }
}
