use std::collections::HashMap;
use std::fmt;

use crate::db::id::{LectureId, RoomId};
use crate::db::lecture;

////////////////////////////////////////////////////////////////////////////////

/// Status a lecture is registered with in the lookup. Manual registration
/// paths use the `active` literal; the lifecycle engine always registers
/// proper lecture statuses. The two are kept distinct so drift stays visible
/// in the logs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum RegisteredStatus {
    Active,
    Lifecycle(lecture::Status),
}

impl RegisteredStatus {
    pub(crate) fn is_admissible(self) -> bool {
        matches!(
            self,
            RegisteredStatus::Active | RegisteredStatus::Lifecycle(lecture::Status::InProgress)
        )
    }

    /// The lifecycle status reported in admission denials. `Active` never
    /// denies, so it has no lifecycle counterpart here.
    pub(crate) fn lifecycle(self) -> Option<lecture::Status> {
        match self {
            RegisteredStatus::Active => None,
            RegisteredStatus::Lifecycle(status) => Some(status),
        }
    }
}

impl From<lecture::Status> for RegisteredStatus {
    fn from(status: lecture::Status) -> Self {
        RegisteredStatus::Lifecycle(status)
    }
}

impl fmt::Display for RegisteredStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RegisteredStatus::Active => f.write_str("active"),
            RegisteredStatus::Lifecycle(status) => status.fmt(f),
        }
    }
}

#[derive(Clone, Debug)]
pub(crate) struct Registration {
    pub(crate) id: LectureId,
    pub(crate) room_id: RoomId,
    pub(crate) status: RegisteredStatus,
}

////////////////////////////////////////////////////////////////////////////////

/// The pair of maps gating `join_room`: room → lecture and lecture →
/// registration. Kept mutually consistent by construction.
#[derive(Debug, Default)]
pub(crate) struct LectureLookup {
    by_room: HashMap<RoomId, LectureId>,
    by_lecture: HashMap<LectureId, Registration>,
}

impl LectureLookup {
    pub(crate) fn register(
        &mut self,
        lecture_id: LectureId,
        room_id: RoomId,
        status: RegisteredStatus,
    ) {
        self.by_room.insert(room_id.clone(), lecture_id.clone());

        self.by_lecture.insert(
            lecture_id.clone(),
            Registration {
                id: lecture_id,
                room_id,
                status,
            },
        );
    }

    pub(crate) fn update_status(
        &mut self,
        lecture_id: &LectureId,
        status: RegisteredStatus,
    ) -> bool {
        match self.by_lecture.get_mut(lecture_id) {
            Some(registration) => {
                registration.status = status;
                true
            }
            None => false,
        }
    }

    pub(crate) fn unregister(&mut self, lecture_id: &LectureId) -> Option<Registration> {
        let registration = self.by_lecture.remove(lecture_id)?;
        self.by_room.remove(&registration.room_id);
        Some(registration)
    }

    pub(crate) fn registration_for_room(&self, room_id: &RoomId) -> Option<&Registration> {
        let lecture_id = self.by_room.get(room_id)?;
        self.by_lecture.get(lecture_id)
    }

    pub(crate) fn room_of(&self, lecture_id: &LectureId) -> Option<&RoomId> {
        self.by_lecture
            .get(lecture_id)
            .map(|registration| &registration.room_id)
    }

    /// True iff a lecture is registered for the room with an admissible
    /// status. An unregistered room is not "available" even though joins to
    /// it are admitted.
    pub(crate) fn is_room_available(&self, room_id: &RoomId) -> bool {
        self.registration_for_room(room_id)
            .map_or(false, |registration| registration.status.is_admissible())
    }
}

////////////////////////////////////////////////////////////////////////////////
