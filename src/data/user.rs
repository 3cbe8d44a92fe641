use std::time::Duration;

use reqwest::{StatusCode, Url};
use serde::{Deserialize, Serialize};

use crate::error::{BackendError, ClassroomError};

/// Minimal view of an account owned by the user-service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: String,
    pub name: String,
    pub email: String,
}

/// Resolves the identity behind an `X-User-Email` header.
#[rocket::async_trait]
pub trait UserDirectory: Send + Sync {
    async fn resolve_user(&self, email: &str) -> Result<UserRecord, ClassroomError>;
}

/// Looks users up through `GET {base}/users/byEmail/{email}` on the user-service.
#[derive(Debug, Clone)]
pub struct HttpUserDirectory {
    base: Url,
    client: reqwest::Client,
}

impl HttpUserDirectory {
    pub fn new(base_url: impl AsRef<str>, timeout: Duration) -> Result<Self, BackendError> {
        let base = Url::parse(base_url.as_ref()).map_err(|e| {
            BackendError::Unreachable(format!("invalid user-service URL: {}", e))
        })?;
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(HttpUserDirectory { base, client })
    }

    fn lookup_url(&self, email: &str) -> Result<Url, ClassroomError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| ClassroomError::Upstream("user-service URL can't have a path".into()))?
            .pop_if_empty()
            .extend(["users", "byEmail", email]);
        Ok(url)
    }
}

#[rocket::async_trait]
impl UserDirectory for HttpUserDirectory {
    #[tracing::instrument(skip(self))]
    async fn resolve_user(&self, email: &str) -> Result<UserRecord, ClassroomError> {
        let url = self.lookup_url(email)?;

        let response = self.client.get(url).send().await.map_err(|e| {
            tracing::warn!("user-service request failed: {}", e);
            ClassroomError::Upstream(format!("user-service unreachable: {}", e))
        })?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(ClassroomError::not_found("user", email)),
            status if status.is_success() => {
                let user: Option<UserRecord> = response.json().await.map_err(|e| {
                    ClassroomError::Upstream(format!("bad user-service response: {}", e))
                })?;
                user.ok_or_else(|| ClassroomError::not_found("user", email))
            }
            status => {
                tracing::warn!("user-service answered {} for {}", status, email);
                Err(ClassroomError::Upstream(format!(
                    "user-service answered {}",
                    status
                )))
            }
        }
    }
}
