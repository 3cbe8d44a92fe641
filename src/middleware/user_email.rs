use rocket::http::Status;
use rocket::request::{self, FromRequest, Request};

use crate::resp::problem::{problems, CaughtProblem, Problem};

pub static USER_EMAIL_HEADER: &str = "X-User-Email";

/// Identity of the caller as asserted by the gateway in front of this service.
/// Nothing here authenticates it; the value is trusted as given.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserEmail(pub String);

impl UserEmail {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for UserEmail {
    type Error = Problem;

    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        match req.headers().get_one(USER_EMAIL_HEADER).map(str::trim) {
            Some(email) if !email.is_empty() => {
                tracing::trace!("request made on behalf of {}", email);
                request::Outcome::Success(UserEmail(email.to_string()))
            }
            _ => {
                tracing::debug!("request without {} header", USER_EMAIL_HEADER);
                let problem = problems::missing_user_email();
                req.local_cache(|| CaughtProblem(Some(problem.clone())));
                request::Outcome::Error((Status::BadRequest, problem))
            }
        }
    }
}
