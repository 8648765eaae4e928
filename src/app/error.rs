use std::error::Error as StdError;
use std::fmt;

use http::StatusCode;

use crate::db::StoreError;

////////////////////////////////////////////////////////////////////////////////

struct ErrorKindProperties {
    status: StatusCode,
    kind: &'static str,
    title: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ErrorKind {
    CommsNotInitialized,
    CommunicationSetupFailed,
    DatabaseReadError,
    DatabaseWriteError,
    EventNotFound,
    EventValidationFailed,
    Forbidden,
    InvalidStatusTransition,
    LectureCancellationFailed,
    LectureDetailsFailed,
    LectureListFailed,
    LectureSchedulingFailed,
    LectureUpdateFailed,
    NoLectureActive,
    NoLectureScheduled,
    ParticipantNotFound,
    ResourceAllocationFailed,
    ResourceDeallocationFailed,
    ResourceStatusFailed,
    RoomFull,
    RoomNotFound,
    Unauthorized,
}

impl ErrorKind {
    pub(crate) fn status(self) -> StatusCode {
        let properties: ErrorKindProperties = self.into();
        properties.status
    }

    pub(crate) fn kind(self) -> &'static str {
        let properties: ErrorKindProperties = self.into();
        properties.kind
    }

    pub(crate) fn title(self) -> &'static str {
        let properties: ErrorKindProperties = self.into();
        properties.title
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let properties: ErrorKindProperties = self.to_owned().into();
        write!(f, "{}", properties.title)
    }
}

#[allow(clippy::from_over_into)]
impl Into<ErrorKindProperties> for ErrorKind {
    fn into(self) -> ErrorKindProperties {
        match self {
            Self::CommsNotInitialized => ErrorKindProperties {
                status: StatusCode::SERVICE_UNAVAILABLE,
                kind: "comms_not_initialized",
                title: "Communication layer not initialized",
            },
            Self::CommunicationSetupFailed => ErrorKindProperties {
                status: StatusCode::UNPROCESSABLE_ENTITY,
                kind: "communication_setup_failed",
                title: "Communication setup failed",
            },
            Self::DatabaseReadError => ErrorKindProperties {
                status: StatusCode::UNPROCESSABLE_ENTITY,
                kind: "database_read_error",
                title: "Database read failed",
            },
            Self::DatabaseWriteError => ErrorKindProperties {
                status: StatusCode::UNPROCESSABLE_ENTITY,
                kind: "database_write_error",
                title: "Database write failed",
            },
            Self::EventNotFound => ErrorKindProperties {
                status: StatusCode::NOT_FOUND,
                kind: "event_not_found",
                title: "Event not found",
            },
            Self::EventValidationFailed => ErrorKindProperties {
                status: StatusCode::BAD_REQUEST,
                kind: "event_validation_failed",
                title: "Event validation failed",
            },
            Self::Forbidden => ErrorKindProperties {
                status: StatusCode::FORBIDDEN,
                kind: "forbidden",
                title: "Forbidden",
            },
            Self::InvalidStatusTransition => ErrorKindProperties {
                status: StatusCode::UNPROCESSABLE_ENTITY,
                kind: "invalid_status_transition",
                title: "Invalid status transition",
            },
            Self::LectureCancellationFailed => ErrorKindProperties {
                status: StatusCode::UNPROCESSABLE_ENTITY,
                kind: "lecture_cancellation_failed",
                title: "Lecture cancellation failed",
            },
            Self::LectureDetailsFailed => ErrorKindProperties {
                status: StatusCode::UNPROCESSABLE_ENTITY,
                kind: "lecture_details_failed",
                title: "Lecture details retrieval failed",
            },
            Self::LectureListFailed => ErrorKindProperties {
                status: StatusCode::UNPROCESSABLE_ENTITY,
                kind: "lecture_list_failed",
                title: "Lecture listing failed",
            },
            Self::LectureSchedulingFailed => ErrorKindProperties {
                status: StatusCode::UNPROCESSABLE_ENTITY,
                kind: "lecture_scheduling_failed",
                title: "Lecture scheduling failed",
            },
            Self::LectureUpdateFailed => ErrorKindProperties {
                status: StatusCode::UNPROCESSABLE_ENTITY,
                kind: "lecture_update_failed",
                title: "Lecture update failed",
            },
            Self::NoLectureActive => ErrorKindProperties {
                status: StatusCode::UNPROCESSABLE_ENTITY,
                kind: "no_lecture_active",
                title: "No lecture active for the room",
            },
            Self::NoLectureScheduled => ErrorKindProperties {
                status: StatusCode::UNPROCESSABLE_ENTITY,
                kind: "no_lecture_scheduled",
                title: "No lecture scheduled for the room",
            },
            Self::ParticipantNotFound => ErrorKindProperties {
                status: StatusCode::NOT_FOUND,
                kind: "participant_not_found",
                title: "Participant not found",
            },
            Self::ResourceAllocationFailed => ErrorKindProperties {
                status: StatusCode::UNPROCESSABLE_ENTITY,
                kind: "resource_allocation_failed",
                title: "Resource allocation failed",
            },
            Self::ResourceDeallocationFailed => ErrorKindProperties {
                status: StatusCode::UNPROCESSABLE_ENTITY,
                kind: "resource_deallocation_failed",
                title: "Resource deallocation failed",
            },
            Self::ResourceStatusFailed => ErrorKindProperties {
                status: StatusCode::UNPROCESSABLE_ENTITY,
                kind: "resource_status_failed",
                title: "Resource status retrieval failed",
            },
            Self::RoomFull => ErrorKindProperties {
                status: StatusCode::SERVICE_UNAVAILABLE,
                kind: "room_full",
                title: "Room is full",
            },
            Self::RoomNotFound => ErrorKindProperties {
                status: StatusCode::NOT_FOUND,
                kind: "room_not_found",
                title: "Room not found",
            },
            Self::Unauthorized => ErrorKindProperties {
                status: StatusCode::FORBIDDEN,
                kind: "unauthorized",
                title: "Unauthorized",
            },
        }
    }
}

////////////////////////////////////////////////////////////////////////////////

pub(crate) struct Error {
    kind: ErrorKind,
    source: anyhow::Error,
}

impl Error {
    pub(crate) fn new(kind: ErrorKind, source: anyhow::Error) -> Self {
        Self { kind, source }
    }

    pub(crate) fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub(crate) fn status(&self) -> StatusCode {
        self.kind.status()
    }

    pub(crate) fn title(&self) -> &'static str {
        self.kind.title()
    }

    pub(crate) fn detail(&self) -> String {
        self.source.to_string()
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Error")
            .field("kind", &self.kind)
            .field("source", &self.source)
            .finish()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {:#}", self.kind, self.source)
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(self.source.as_ref())
    }
}

impl From<StoreError> for Error {
    fn from(source: StoreError) -> Self {
        let kind = match source {
            StoreError::Read(_) => ErrorKind::DatabaseReadError,
            StoreError::Write(_) => ErrorKind::DatabaseWriteError,
        };

        Self {
            kind,
            source: anyhow::Error::from(source),
        }
    }
}

////////////////////////////////////////////////////////////////////////////////

pub(crate) trait ErrorExt<T> {
    fn error(self, kind: ErrorKind) -> Result<T, Error>;
}

impl<T, E: Into<anyhow::Error>> ErrorExt<T> for Result<T, E> {
    fn error(self, kind: ErrorKind) -> Result<T, Error> {
        self.map_err(|source| Error::new(kind, source.into()))
    }
}

////////////////////////////////////////////////////////////////////////////////
