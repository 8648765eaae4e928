use std::fmt;
use std::ops::RangeInclusive;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{
    id::{LectureId, RoomId, UserId},
    Db, StoreError,
};

////////////////////////////////////////////////////////////////////////////////

pub(crate) const NAME_LEN: RangeInclusive<usize> = 3..=100;
pub(crate) const DESCRIPTION_LEN: RangeInclusive<usize> = 10..=500;
pub(crate) const MAX_PARTICIPANTS: RangeInclusive<u32> = 1..=100;

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub(crate) enum Status {
    Scheduled,
    Delayed,
    InProgress,
    Completed,
    Cancelled,
}

impl Status {
    /// The lifecycle transition table. Terminal states allow nothing.
    pub(crate) fn may_transition_to(self, next: Status) -> bool {
        use Status::*;

        match self {
            Scheduled => matches!(next, InProgress | Cancelled | Delayed),
            Delayed => matches!(next, InProgress | Cancelled),
            InProgress => matches!(next, Completed | Cancelled),
            Completed | Cancelled => false,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let label = match self {
            Status::Scheduled => "scheduled",
            Status::Delayed => "delayed",
            Status::InProgress => "in-progress",
            Status::Completed => "completed",
            Status::Cancelled => "cancelled",
        };

        f.write_str(label)
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Object {
    pub(crate) id: LectureId,
    pub(crate) name: String,
    pub(crate) date: DateTime<Utc>,
    pub(crate) room_id: RoomId,
    #[serde(rename = "type")]
    pub(crate) kind: String,
    pub(crate) status: Status,
    pub(crate) teacher_id: UserId,
    pub(crate) created_by: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) max_participants: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) start_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) end_time: Option<DateTime<Utc>>,
}

impl Object {
    pub(crate) fn new(
        id: LectureId,
        name: String,
        date: DateTime<Utc>,
        room_id: RoomId,
        teacher_id: UserId,
        created_by: UserId,
    ) -> Self {
        Self {
            id,
            name,
            date,
            room_id,
            kind: "lecture".to_owned(),
            status: Status::Scheduled,
            teacher_id,
            created_by,
            description: None,
            max_participants: None,
            start_time: None,
            end_time: None,
        }
    }
}

////////////////////////////////////////////////////////////////////////////////

#[derive(Debug, Default)]
pub(crate) struct FindQuery {
    id: Option<LectureId>,
}

impl FindQuery {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn id(self, id: LectureId) -> Self {
        Self { id: Some(id) }
    }

    pub(crate) fn execute(&self, db: &Db) -> Option<Object> {
        let document = db.snapshot();

        document
            .lectures
            .iter()
            .find(|lecture| self.id.as_ref().map_or(true, |id| *id == lecture.id))
            .cloned()
    }
}

/// Conjunctive filter over the lectures collection.
#[derive(Debug, Default)]
pub(crate) struct ListQuery {
    room_id: Option<RoomId>,
    teacher_id: Option<UserId>,
    status: Option<Status>,
}

impl ListQuery {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn room_id(self, room_id: RoomId) -> Self {
        Self {
            room_id: Some(room_id),
            ..self
        }
    }

    pub(crate) fn teacher_id(self, teacher_id: UserId) -> Self {
        Self {
            teacher_id: Some(teacher_id),
            ..self
        }
    }

    pub(crate) fn status(self, status: Status) -> Self {
        Self {
            status: Some(status),
            ..self
        }
    }

    pub(crate) fn execute(&self, db: &Db) -> Vec<Object> {
        let document = db.snapshot();

        document
            .lectures
            .iter()
            .filter(|lecture| self.matches(lecture))
            .cloned()
            .collect()
    }

    fn matches(&self, lecture: &Object) -> bool {
        self.room_id.as_ref().map_or(true, |id| *id == lecture.room_id)
            && self
                .teacher_id
                .as_ref()
                .map_or(true, |id| *id == lecture.teacher_id)
            && self.status.map_or(true, |status| status == lecture.status)
    }
}

#[derive(Debug)]
pub(crate) struct InsertQuery {
    lecture: Object,
}

impl InsertQuery {
    pub(crate) fn new(lecture: Object) -> Self {
        Self { lecture }
    }

    pub(crate) fn execute(self, db: &Db) -> Result<Object, StoreError> {
        let lecture = self.lecture;

        db.commit(move |document| {
            document.lectures.push(lecture.clone());
            lecture
        })
    }
}

/// Shallow-merge patch for a lecture row. Timing fields are only ever set,
/// never cleared.
#[derive(Clone, Debug, Default)]
pub(crate) struct Patch {
    pub(crate) name: Option<String>,
    pub(crate) date: Option<DateTime<Utc>>,
    pub(crate) room_id: Option<RoomId>,
    pub(crate) status: Option<Status>,
    pub(crate) description: Option<String>,
    pub(crate) max_participants: Option<u32>,
    pub(crate) start_time: Option<DateTime<Utc>>,
    pub(crate) end_time: Option<DateTime<Utc>>,
}

#[derive(Debug)]
pub(crate) struct UpdateQuery {
    id: LectureId,
    patch: Patch,
}

impl UpdateQuery {
    pub(crate) fn new(id: LectureId, patch: Patch) -> Self {
        Self { id, patch }
    }

    pub(crate) fn execute(self, db: &Db) -> Result<Option<Object>, StoreError> {
        let Self { id, patch } = self;

        db.commit(move |document| {
            let lecture = document.lectures.iter_mut().find(|lecture| lecture.id == id)?;

            if let Some(name) = patch.name {
                lecture.name = name;
            }

            if let Some(date) = patch.date {
                lecture.date = date;
            }

            if let Some(room_id) = patch.room_id {
                lecture.room_id = room_id;
            }

            if let Some(status) = patch.status {
                lecture.status = status;
            }

            if let Some(description) = patch.description {
                lecture.description = Some(description);
            }

            if let Some(max_participants) = patch.max_participants {
                lecture.max_participants = Some(max_participants);
            }

            if let Some(start_time) = patch.start_time {
                lecture.start_time = Some(start_time);
            }

            if let Some(end_time) = patch.end_time {
                lecture.end_time = Some(end_time);
            }

            Some(lecture.clone())
        })
    }
}

////////////////////////////////////////////////////////////////////////////////
