use chrono::{DateTime, Utc};

use crate::db::{
    id::{RoomId, UserId},
    lecture, Db,
};
use crate::protocol::{Role, User, UserStatus};

pub(crate) fn user(id: &str, role: Role) -> User {
    User {
        id: UserId::new(id),
        username: id.to_ascii_lowercase(),
        role,
        status: UserStatus::Online,
        display_name: None,
        email: None,
    }
}

pub(crate) struct Lecture {
    name: String,
    date: DateTime<Utc>,
    room_id: String,
    teacher_id: String,
    status: lecture::Status,
}

impl Lecture {
    pub(crate) fn new(room_id: &str, teacher_id: &str) -> Self {
        Self {
            name: "Algebra".to_owned(),
            date: "2025-01-01T10:00:00Z".parse().unwrap(),
            room_id: room_id.to_owned(),
            teacher_id: teacher_id.to_owned(),
            status: lecture::Status::Scheduled,
        }
    }

    pub(crate) fn status(self, status: lecture::Status) -> Self {
        Self { status, ..self }
    }

    pub(crate) fn insert(self, db: &Db) -> lecture::Object {
        let mut object = lecture::Object::new(
            db.next_lecture_id(),
            self.name,
            self.date,
            RoomId::new(self.room_id),
            UserId::new(self.teacher_id.clone()),
            UserId::new(self.teacher_id),
        );

        object.status = self.status;

        lecture::InsertQuery::new(object)
            .execute(db)
            .expect("Failed to insert lecture")
    }
}
