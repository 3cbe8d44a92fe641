use std::io::Cursor;

use rocket::http::ContentType;
use rocket::http::Status;
use rocket::response::Responder;
use rocket::{response, Request, Response};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt::{Display, Formatter};
use utoipa::ToSchema;

use crate::error::ClassroomError;

/// Implements [RFC7807](https://tools.ietf.org/html/rfc7807).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Problem {
    #[serde(skip)]
    #[schema(value_type = u16)]
    pub status: Status,
    pub type_uri: String,
    pub title: String,

    pub detail: Option<String>,
    pub instance_uri: Option<String>,

    #[schema(value_type = Object)]
    pub body: Map<String, Value>,
}

/// Problem raised by a request guard, kept in the request cache so the catcher
/// can render it instead of a generic one.
#[derive(Debug, Clone, Default)]
pub struct CaughtProblem(pub Option<Problem>);

impl Default for Problem {
    fn default() -> Self {
        Problem {
            status: Status::InternalServerError,
            type_uri: "about:blank".to_string(),
            title: "Problem".to_string(),
            detail: None,
            instance_uri: None,
            body: Map::new(),
        }
    }
}

impl Problem {
    pub fn new_untyped(status: Status, title: impl ToString) -> Problem {
        Problem {
            status,
            type_uri: "about:blank".to_string(),
            title: title.to_string(),
            ..Default::default()
        }
    }

    pub fn detail(&mut self, value: impl ToString) -> &mut Problem {
        self.detail = Some(value.to_string());
        self
    }

    pub fn insert_str(&mut self, key: impl ToString, value: impl ToString) -> &mut Problem {
        self.body
            .insert(key.to_string(), Value::String(value.to_string()));
        self
    }
}

impl Display for Problem {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.status, self.title)
    }
}

impl std::error::Error for Problem {}

impl<'r> Responder<'r, 'static> for Problem {
    fn respond_to(self, _: &'r Request<'_>) -> response::Result<'static> {
        let mut body = self.body.clone();

        // Following are required by rfc7807
        body.insert(String::from("type"), serde_json::Value::from(self.type_uri));
        body.insert(String::from("title"), serde_json::Value::from(self.title));

        // Optional parameters as specified by rfc7807
        if let Some(detail) = self.detail {
            body.insert(String::from("detail"), serde_json::Value::from(detail));
        }
        body.insert(
            String::from("status"),
            serde_json::Value::from(self.status.code),
        );
        if let Some(instance) = self.instance_uri {
            body.insert(String::from("instance"), serde_json::Value::from(instance));
        }

        let body_string = serde_json::to_string(&body)
            .expect("JSON map keys and values must be JSON serializable");

        Response::build()
            .status(self.status)
            .header(ContentType::new("application", "problem+json"))
            .raw_header("Content-Language", "en")
            .sized_body(body_string.len(), Cursor::new(body_string))
            .ok()
    }
}

pub mod problems {
    use crate::resp::problem::Problem;
    use rocket::http::Status;

    #[inline]
    pub fn parse_problem() -> Problem {
        Problem::new_untyped(
            Status::BadRequest,
            "There was a problem parsing part of the request.",
        )
    }

    #[inline]
    pub fn missing_user_email() -> Problem {
        Problem::new_untyped(Status::BadRequest, "Missing user identity.")
            .detail("The X-User-Email header is required.")
            .clone()
    }

    #[inline]
    pub fn classroom_not_found(id: impl ToString) -> Problem {
        Problem::new_untyped(Status::NotFound, "Classroom doesn't exist.")
            .insert_str("id", id)
            .clone()
    }
}

impl From<ClassroomError> for Problem {
    fn from(e: ClassroomError) -> Self {
        match e {
            ClassroomError::NotFound { entity, key } => {
                Problem::new_untyped(Status::NotFound, "Requested resource doesn't exist.")
                    .detail(format!("{} not found", entity))
                    .insert_str("entity", entity)
                    .insert_str("key", key)
                    .clone()
            }
            ClassroomError::PermissionDenied(detail) => {
                Problem::new_untyped(Status::Forbidden, "Permission denied.")
                    .detail(detail)
                    .clone()
            }
            ClassroomError::Conflict(detail) => {
                Problem::new_untyped(Status::Conflict, "Request conflicts with current state.")
                    .detail(detail)
                    .clone()
            }
            ClassroomError::Validation(detail) => {
                Problem::new_untyped(Status::BadRequest, "Invalid request.")
                    .detail(detail)
                    .clone()
            }
            ClassroomError::Upstream(detail) => {
                tracing::error!("upstream failure: {}", detail);
                Problem::new_untyped(
                    Status::InternalServerError,
                    "An upstream service failed while processing request.",
                )
            }
            ClassroomError::CodeSpaceExhausted(attempts) => {
                tracing::error!("classroom code space exhausted after {} attempts", attempts);
                Problem::new_untyped(
                    Status::InternalServerError,
                    "Unable to allocate a classroom code.",
                )
            }
            ClassroomError::Database(e) => Problem::from(e),
            ClassroomError::BsonSer(_) => Problem::new_untyped(
                Status::InternalServerError,
                "An error occurred while processing BSON data.",
            ),
            ClassroomError::BsonDe(e) => Problem::from(e),
            ClassroomError::Io(e) => Problem::from(e),
        }
    }
}

impl From<mongodb::error::Error> for Problem {
    fn from(e: mongodb::error::Error) -> Self {
        use mongodb::error::ErrorKind;

        fn mongodb_problem() -> Problem {
            Problem::new_untyped(
                Status::InternalServerError,
                "MongoDB failed while processing request.",
            )
        }

        fn access_problem() -> Problem {
            Problem::new_untyped(
                Status::InternalServerError,
                "Server was unable to access MongoDB.",
            )
        }

        fn bad_db_request() -> Problem {
            Problem::new_untyped(
                Status::InternalServerError,
                "MongoDB was unable to process bad server request.",
            )
        }

        fn bson_problem() -> Problem {
            Problem::new_untyped(
                Status::InternalServerError,
                "There was a problem with handling MongoDB bson.",
            )
        }

        fn timeout_problem() -> Problem {
            Problem::new_untyped(
                Status::InternalServerError,
                "A timeout occurred while accessing MongoDB.",
            )
        }

        match e.kind.as_ref() {
            ErrorKind::InvalidArgument { .. } => bad_db_request(),
            ErrorKind::Authentication { .. } => access_problem(),
            ErrorKind::BsonDeserialization(_) => bson_problem(),
            ErrorKind::BsonSerialization(_) => bson_problem(),
            ErrorKind::BulkWrite(_) => bad_db_request(),
            ErrorKind::Command(_) => bad_db_request(),
            ErrorKind::DnsResolve { .. } => access_problem(),
            ErrorKind::Internal { .. } => mongodb_problem(),
            ErrorKind::Io(_) => mongodb_problem()
                .detail("An IO error occurred. Submitted data might not be properly stored.")
                .clone(),
            ErrorKind::ConnectionPoolCleared { .. } => mongodb_problem(),
            ErrorKind::InvalidResponse { .. } => mongodb_problem(),
            ErrorKind::ServerSelection { .. } => access_problem(),
            ErrorKind::SessionsNotSupported => mongodb_problem(),
            ErrorKind::InvalidTlsConfig { .. } => access_problem(),
            ErrorKind::Write(_) => mongodb_problem()
                .detail("A write error occurred. Submitted data might not be properly stored.")
                .clone(),
            ErrorKind::Transaction { .. } => mongodb_problem(),
            ErrorKind::IncompatibleServer { .. } => access_problem(),
            _ => mongodb_problem(),
        }
    }
}

impl From<bson::de::Error> for Problem {
    fn from(_: bson::de::Error) -> Self {
        Problem::new_untyped(
            Status::InternalServerError,
            "An error occurred while processing BSON data.",
        )
    }
}

impl From<std::io::Error> for Problem {
    fn from(_: std::io::Error) -> Self {
        Problem::new_untyped(Status::InternalServerError, "Server IO error")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classroom_errors_map_to_statuses() {
        let cases = vec![
            (ClassroomError::not_found("section", "s1"), Status::NotFound),
            (
                ClassroomError::PermissionDenied("not owner".to_string()),
                Status::Forbidden,
            ),
            (
                ClassroomError::Conflict("already enrolled".to_string()),
                Status::Conflict,
            ),
            (
                ClassroomError::Validation("blank title".to_string()),
                Status::BadRequest,
            ),
            (
                ClassroomError::Upstream("timeout".to_string()),
                Status::InternalServerError,
            ),
            (
                ClassroomError::CodeSpaceExhausted(64),
                Status::InternalServerError,
            ),
        ];

        for (error, status) in cases {
            assert_eq!(Problem::from(error).status, status);
        }
    }

    #[test]
    fn not_found_names_the_entity() {
        let problem = Problem::from(ClassroomError::not_found("assignment", "a-1"));
        assert_eq!(problem.body.get("entity"), Some(&Value::from("assignment")));
        assert_eq!(problem.body.get("key"), Some(&Value::from("a-1")));
    }
}
