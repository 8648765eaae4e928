use std::sync::Arc;

use anyhow::anyhow;
use chrono::Utc;
use once_cell::sync::OnceCell;
use serde::Deserialize;
use tracing::{info, warn};

use crate::app::error::{Error, ErrorExt, ErrorKind};
use crate::db::{
    id::RoomId,
    lecture, room, Db,
};
use crate::rtc::{lookup::RegisteredStatus, RtcCore};

////////////////////////////////////////////////////////////////////////////////

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CreateRoomOptions {
    pub(crate) name: String,
    pub(crate) capacity: u32,
    #[serde(default)]
    pub(crate) features: Option<room::Features>,
}

/// Thin service over the store's rooms collection. The RTC core is attached
/// after both sides exist; room operations that need it fail with
/// `CommsNotInitialized` until then.
pub(crate) struct RoomRegistry {
    db: Db,
    rtc: OnceCell<Arc<RtcCore>>,
}

impl RoomRegistry {
    pub(crate) fn new(db: Db) -> Self {
        Self {
            db,
            rtc: OnceCell::new(),
        }
    }

    pub(crate) fn attach_rtc(&self, rtc: Arc<RtcCore>) {
        if self.rtc.set(rtc).is_err() {
            warn!("RTC core attached twice, keeping the first one");
        }
    }

    fn rtc(&self) -> Result<&Arc<RtcCore>, Error> {
        self.rtc
            .get()
            .ok_or_else(|| anyhow!("RTC core is not attached"))
            .error(ErrorKind::CommsNotInitialized)
    }

    ////////////////////////////////////////////////////////////////////////////

    pub(crate) fn create_room(&self, options: CreateRoomOptions) -> Result<room::Object, Error> {
        let rtc = self.rtc()?;
        let now = Utc::now();

        let object = room::Object {
            id: self.db.next_room_id(),
            name: options.name,
            capacity: options.capacity,
            status: room::Status::Available,
            features: options.features.unwrap_or_default(),
            current_lecture: None,
            created_at: now,
            updated_at: now,
        };

        let inserted = room::InsertQuery::new(object).execute(&self.db)?;
        rtc.setup_for_room(inserted.id.clone());

        info!(room_id = %inserted.id, "room created");
        Ok(inserted)
    }

    pub(crate) fn get_room(&self, id: &RoomId) -> Result<room::Object, Error> {
        room::FindQuery::new()
            .id(id.clone())
            .execute(&self.db)
            .ok_or_else(|| anyhow!("no room '{}'", id))
            .error(ErrorKind::RoomNotFound)
    }

    pub(crate) fn list_rooms(&self) -> Vec<room::Object> {
        room::ListQuery::new().execute(&self.db)
    }

    /// A room with a registered lecture can not be deleted.
    pub(crate) fn delete_room(&self, id: &RoomId) -> Result<(), Error> {
        let rtc = self.rtc()?;

        if rtc.registered_lecture(id).is_some() {
            return Err(anyhow!("a lecture is registered for room '{}'", id))
                .error(ErrorKind::Forbidden);
        }

        let removed = room::DeleteQuery::new(id.clone()).execute(&self.db)?;

        if removed == 0 {
            return Err(anyhow!("no room '{}'", id)).error(ErrorKind::RoomNotFound);
        }

        rtc.clear_room(id);
        info!(room_id = %id, "room deleted");
        Ok(())
    }

    ////////////////////////////////////////////////////////////////////////////

    /// Binds a lecture to its room ahead of time: the room moves to
    /// `scheduled` and carries the lecture summary.
    pub(crate) fn assign_lecture_to_room(
        &self,
        lecture: &lecture::Object,
    ) -> Result<room::Object, Error> {
        let patch = room::Patch {
            status: Some(room::Status::Scheduled),
            current_lecture: Some(Some(summary(lecture))),
            ..room::Patch::default()
        };

        room::UpdateQuery::new(lecture.room_id.clone(), patch)
            .execute(&self.db)?
            .ok_or_else(|| anyhow!("no room '{}'", lecture.room_id))
            .error(ErrorKind::RoomNotFound)
    }

    /// Manual start: registers the assigned lecture under the legacy
    /// `active` status. The canonical path is the lifecycle engine.
    pub(crate) fn start_lecture(&self, room_id: &RoomId) -> Result<room::Object, Error> {
        let room = self.get_room(room_id)?;

        let current = room
            .current_lecture
            .as_ref()
            .ok_or_else(|| anyhow!("no lecture assigned to room '{}'", room_id))
            .error(ErrorKind::NoLectureScheduled)?;

        self.rtc()?.register_lecture(
            current.id.clone(),
            room_id.clone(),
            RegisteredStatus::Active,
        );

        let patch = room::Patch {
            status: Some(room::Status::Occupied),
            ..room::Patch::default()
        };

        room::UpdateQuery::new(room_id.clone(), patch)
            .execute(&self.db)?
            .ok_or_else(|| anyhow!("no room '{}'", room_id))
            .error(ErrorKind::RoomNotFound)
    }

    /// Manual end: clears the runtime and releases the room.
    pub(crate) fn end_lecture(&self, room_id: &RoomId) -> Result<room::Object, Error> {
        let rtc = self.rtc()?;

        let registration = rtc
            .registered_lecture(room_id)
            .ok_or_else(|| anyhow!("no lecture registered for room '{}'", room_id))
            .error(ErrorKind::NoLectureActive)?;

        rtc.clear_room(room_id);
        rtc.unregister_lecture(&registration.id);
        self.release_room(room_id)
    }

    ////////////////////////////////////////////////////////////////////////////
    // Mirror calls from the lifecycle engine

    pub(crate) fn mark_room_occupied(
        &self,
        lecture: &lecture::Object,
    ) -> Result<room::Object, Error> {
        let patch = room::Patch {
            status: Some(room::Status::Occupied),
            current_lecture: Some(Some(summary(lecture))),
            ..room::Patch::default()
        };

        room::UpdateQuery::new(lecture.room_id.clone(), patch)
            .execute(&self.db)?
            .ok_or_else(|| anyhow!("no room '{}'", lecture.room_id))
            .error(ErrorKind::RoomNotFound)
    }

    pub(crate) fn release_room(&self, room_id: &RoomId) -> Result<room::Object, Error> {
        let patch = room::Patch {
            status: Some(room::Status::Available),
            current_lecture: Some(None),
            ..room::Patch::default()
        };

        room::UpdateQuery::new(room_id.clone(), patch)
            .execute(&self.db)?
            .ok_or_else(|| anyhow!("no room '{}'", room_id))
            .error(ErrorKind::RoomNotFound)
    }
}

fn summary(lecture: &lecture::Object) -> room::CurrentLecture {
    room::CurrentLecture {
        id: lecture.id.clone(),
        name: lecture.name.clone(),
        teacher_id: lecture.teacher_id.clone(),
        status: lecture.status,
    }
}

////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_helpers::context::TestContext;
    use crate::test_helpers::factory;

    #[test]
    fn create_room_defaults_features_and_sets_up_runtime() {
        let context = TestContext::new();

        let room = context
            .registry
            .create_room(CreateRoomOptions {
                name: "Physics lab".to_owned(),
                capacity: 15,
                features: None,
            })
            .expect("Failed to create room");

        assert_eq!(room.id, RoomId::new("room_1"));
        assert_eq!(room.features, room::Features::default());
        assert_eq!(room.status, room::Status::Available);

        // The runtime exists and survives repeated setup.
        context.rtc.setup_for_room(room.id.clone());
        assert!(context.rtc.room_participants(&room.id).is_empty());
    }

    #[test]
    fn detached_registry_reports_comms_not_initialized() {
        let context = TestContext::detached();

        let err = context
            .registry
            .create_room(CreateRoomOptions {
                name: "Physics lab".to_owned(),
                capacity: 15,
                features: None,
            })
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::CommsNotInitialized);
    }

    #[test]
    fn manual_start_uses_the_active_status_and_end_releases() {
        let context = TestContext::new();
        let lecture = factory::Lecture::new("test-room-1", "T1").insert(context.db());

        context
            .registry
            .assign_lecture_to_room(&lecture)
            .expect("Failed to assign");

        let started = context
            .registry
            .start_lecture(&lecture.room_id)
            .expect("Failed to start");

        assert_eq!(started.status, room::Status::Occupied);
        assert!(context.rtc.is_room_available(&lecture.room_id));

        let ended = context
            .registry
            .end_lecture(&lecture.room_id)
            .expect("Failed to end");

        assert_eq!(ended.status, room::Status::Available);
        assert!(ended.current_lecture.is_none());
        assert!(!context.rtc.is_room_available(&lecture.room_id));
    }

    #[test]
    fn start_without_assignment_fails() {
        let context = TestContext::new();

        let err = context
            .registry
            .start_lecture(&RoomId::new("test-room-1"))
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::NoLectureScheduled);
    }

    #[test]
    fn end_without_registration_fails() {
        let context = TestContext::new();

        let err = context
            .registry
            .end_lecture(&RoomId::new("test-room-1"))
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::NoLectureActive);
    }

    #[test]
    fn room_with_registered_lecture_can_not_be_deleted() {
        let context = TestContext::new();
        let lecture = factory::Lecture::new("test-room-1", "T1").insert(context.db());

        context.registry.assign_lecture_to_room(&lecture).unwrap();
        context.registry.start_lecture(&lecture.room_id).unwrap();

        let err = context
            .registry
            .delete_room(&lecture.room_id)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);

        context.registry.end_lecture(&lecture.room_id).unwrap();
        context
            .registry
            .delete_room(&lecture.room_id)
            .expect("Failed to delete");

        let err = context
            .registry
            .get_room(&lecture.room_id)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RoomNotFound);
    }
}
