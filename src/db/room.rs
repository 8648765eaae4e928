use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{
    id::{LectureId, RoomId, UserId},
    lecture, Db, StoreError,
};

////////////////////////////////////////////////////////////////////////////////

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub(crate) enum Status {
    Available,
    Occupied,
    Scheduled,
    Maintenance,
}

/// Per-room capability toggles.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Features {
    pub(crate) video: bool,
    pub(crate) audio: bool,
    pub(crate) chat: bool,
    pub(crate) whiteboard: bool,
    pub(crate) screen_share: bool,
}

impl Default for Features {
    fn default() -> Self {
        Self {
            video: true,
            audio: true,
            chat: true,
            whiteboard: false,
            screen_share: true,
        }
    }
}

/// Summary of the lecture currently bound to a room.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CurrentLecture {
    pub(crate) id: LectureId,
    pub(crate) name: String,
    pub(crate) teacher_id: UserId,
    pub(crate) status: lecture::Status,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Object {
    pub(crate) id: RoomId,
    pub(crate) name: String,
    pub(crate) capacity: u32,
    pub(crate) status: Status,
    pub(crate) features: Features,
    #[serde(default)]
    pub(crate) current_lecture: Option<CurrentLecture>,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) updated_at: DateTime<Utc>,
}

impl Object {
    /// The room a fresh store starts with.
    pub(crate) fn seed(id: RoomId) -> Self {
        let now = Utc::now();

        Self {
            id,
            name: "Test Room".to_owned(),
            capacity: 30,
            status: Status::Available,
            features: Features::default(),
            current_lecture: None,
            created_at: now,
            updated_at: now,
        }
    }
}

////////////////////////////////////////////////////////////////////////////////

#[derive(Debug, Default)]
pub(crate) struct FindQuery {
    id: Option<RoomId>,
}

impl FindQuery {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn id(self, id: RoomId) -> Self {
        Self { id: Some(id) }
    }

    pub(crate) fn execute(&self, db: &Db) -> Option<Object> {
        let document = db.snapshot();
        document.rooms.iter().find(|room| self.matches(room)).cloned()
    }

    fn matches(&self, room: &Object) -> bool {
        self.id.as_ref().map_or(true, |id| *id == room.id)
    }
}

#[derive(Debug, Default)]
pub(crate) struct ListQuery {
    status: Option<Status>,
}

impl ListQuery {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    #[allow(dead_code)]
    pub(crate) fn status(self, status: Status) -> Self {
        Self {
            status: Some(status),
        }
    }

    pub(crate) fn execute(&self, db: &Db) -> Vec<Object> {
        let document = db.snapshot();

        document
            .rooms
            .iter()
            .filter(|room| self.status.map_or(true, |status| status == room.status))
            .cloned()
            .collect()
    }
}

#[derive(Debug)]
pub(crate) struct InsertQuery {
    room: Object,
}

impl InsertQuery {
    pub(crate) fn new(room: Object) -> Self {
        Self { room }
    }

    pub(crate) fn execute(self, db: &Db) -> Result<Object, StoreError> {
        let room = self.room;

        db.commit(move |document| {
            document.rooms.push(room.clone());
            room
        })
    }
}

/// Shallow-merge patch for a room row. `current_lecture` is doubly optional
/// so a patch can both set and clear the binding.
#[derive(Clone, Debug, Default)]
pub(crate) struct Patch {
    pub(crate) name: Option<String>,
    pub(crate) capacity: Option<u32>,
    pub(crate) status: Option<Status>,
    pub(crate) features: Option<Features>,
    pub(crate) current_lecture: Option<Option<CurrentLecture>>,
}

#[derive(Debug)]
pub(crate) struct UpdateQuery {
    id: RoomId,
    patch: Patch,
}

impl UpdateQuery {
    pub(crate) fn new(id: RoomId, patch: Patch) -> Self {
        Self { id, patch }
    }

    pub(crate) fn execute(self, db: &Db) -> Result<Option<Object>, StoreError> {
        let Self { id, patch } = self;

        db.commit(move |document| {
            let room = document.rooms.iter_mut().find(|room| room.id == id)?;

            if let Some(name) = patch.name {
                room.name = name;
            }

            if let Some(capacity) = patch.capacity {
                room.capacity = capacity;
            }

            if let Some(status) = patch.status {
                room.status = status;
            }

            if let Some(features) = patch.features {
                room.features = features;
            }

            if let Some(current_lecture) = patch.current_lecture {
                room.current_lecture = current_lecture;
            }

            room.updated_at = Utc::now();
            Some(room.clone())
        })
    }
}

#[derive(Debug)]
pub(crate) struct DeleteQuery {
    id: RoomId,
}

impl DeleteQuery {
    pub(crate) fn new(id: RoomId) -> Self {
        Self { id }
    }

    pub(crate) fn execute(self, db: &Db) -> Result<usize, StoreError> {
        let id = self.id;

        db.commit(move |document| {
            let before = document.rooms.len();
            document.rooms.retain(|room| room.id != id);
            before - document.rooms.len()
        })
    }
}

////////////////////////////////////////////////////////////////////////////////
