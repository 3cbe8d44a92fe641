//! In-memory stand-ins for MongoDB, the user-service and blob storage.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use uuid::Uuid;

use crate::blob::{BlobStore, FileUpload};
use crate::data::classroom::db::{ClassroomStore, Inserted};
use crate::data::classroom::Classroom;
use crate::data::user::{UserDirectory, UserRecord};
use crate::error::ClassroomError;

pub const FACULTY: &str = "faye@uni.edu";
pub const OTHER_FACULTY: &str = "olaf@uni.edu";
pub const STUDENT: &str = "sam@uni.edu";
pub const STUDENT_2: &str = "tess@uni.edu";

pub fn pdf(name: &str) -> FileUpload {
    FileUpload {
        bytes: format!("%PDF-1.7 {}", name).into_bytes(),
        content_type: Some("application/pdf".to_string()),
        filename: Some(name.to_string()),
    }
}

#[derive(Default)]
pub struct MemoryClassroomStore {
    classrooms: Mutex<Vec<Classroom>>,
    rejected_inserts: AtomicUsize,
    yield_on_read: bool,
}

impl MemoryClassroomStore {
    /// Reports the next `count` inserts as join code collisions.
    pub fn reject_inserts(self, count: usize) -> Self {
        self.rejected_inserts.store(count, Ordering::SeqCst);
        self
    }

    /// Yields to the executor after every read so concurrent requests interleave
    /// between loading and storing a classroom.
    pub fn yield_on_read(mut self) -> Self {
        self.yield_on_read = true;
        self
    }

    pub fn snapshot(&self) -> Vec<Classroom> {
        self.classrooms.lock().unwrap().clone()
    }

    pub fn get(&self, id: Uuid) -> Option<Classroom> {
        self.snapshot().into_iter().find(|it| it.id == id)
    }

    async fn after_read(&self) {
        if self.yield_on_read {
            tokio::task::yield_now().await;
        }
    }
}

#[rocket::async_trait]
impl ClassroomStore for MemoryClassroomStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Classroom>, ClassroomError> {
        let found = self.get(id);
        self.after_read().await;
        Ok(found)
    }

    async fn find_by_code(&self, code: &str) -> Result<Option<Classroom>, ClassroomError> {
        let found = self
            .snapshot()
            .into_iter()
            .find(|it| it.classroom_code == code);
        self.after_read().await;
        Ok(found)
    }

    async fn find_by_student(&self, student_id: &str) -> Result<Vec<Classroom>, ClassroomError> {
        Ok(self
            .snapshot()
            .into_iter()
            .filter(|it| it.is_enrolled(student_id))
            .collect())
    }

    async fn insert(&self, classroom: &Classroom) -> Result<Inserted, ClassroomError> {
        let remaining = self.rejected_inserts.load(Ordering::SeqCst);
        if remaining > 0 {
            self.rejected_inserts.store(remaining - 1, Ordering::SeqCst);
            return Ok(Inserted::CodeTaken);
        }

        let mut classrooms = self.classrooms.lock().unwrap();
        if classrooms
            .iter()
            .any(|it| it.classroom_code == classroom.classroom_code)
        {
            return Ok(Inserted::CodeTaken);
        }
        classrooms.push(classroom.clone());
        Ok(Inserted::Created)
    }

    async fn replace(&self, classroom: &Classroom) -> Result<Option<Classroom>, ClassroomError> {
        let mut classrooms = self.classrooms.lock().unwrap();
        let stored = match classrooms.iter_mut().find(|it| it.id == classroom.id) {
            Some(it) if it.version == classroom.version => it,
            _ => return Ok(None),
        };

        let mut next = classroom.clone();
        next.version += 1;
        *stored = next.clone();
        Ok(Some(next))
    }
}

pub struct MemoryUserDirectory {
    users: HashMap<String, UserRecord>,
    unreachable: bool,
}

impl MemoryUserDirectory {
    pub fn example() -> Self {
        let users = [
            ("faculty-1", "Prof. Faye", FACULTY),
            ("faculty-2", "Prof. Olaf", OTHER_FACULTY),
            ("student-1", "Sam Student", STUDENT),
            ("student-2", "Tess Student", STUDENT_2),
        ]
        .into_iter()
        .map(|(id, name, email)| {
            (
                email.to_string(),
                UserRecord {
                    id: id.to_string(),
                    name: name.to_string(),
                    email: email.to_string(),
                },
            )
        })
        .collect();

        MemoryUserDirectory {
            users,
            unreachable: false,
        }
    }

    pub fn unreachable() -> Self {
        MemoryUserDirectory {
            users: HashMap::new(),
            unreachable: true,
        }
    }
}

#[rocket::async_trait]
impl UserDirectory for MemoryUserDirectory {
    async fn resolve_user(&self, email: &str) -> Result<UserRecord, ClassroomError> {
        if self.unreachable {
            return Err(ClassroomError::Upstream("user-service unreachable".to_string()));
        }
        self.users
            .get(email)
            .cloned()
            .ok_or_else(|| ClassroomError::not_found("user", email))
    }
}

#[derive(Default)]
pub struct MemoryBlobStore {
    uploaded: Mutex<Vec<String>>,
    failing: bool,
}

impl MemoryBlobStore {
    pub fn failing() -> Self {
        MemoryBlobStore {
            uploaded: Mutex::default(),
            failing: true,
        }
    }

    pub fn uploaded(&self) -> Vec<String> {
        self.uploaded.lock().unwrap().clone()
    }
}

#[rocket::async_trait]
impl BlobStore for MemoryBlobStore {
    async fn upload(&self, file: FileUpload) -> Result<String, ClassroomError> {
        if self.failing {
            return Err(ClassroomError::Upstream("blob storage unavailable".to_string()));
        }
        let url = format!("https://blobs.test/files/{}", file.blob_name());
        self.uploaded.lock().unwrap().push(url.clone());
        Ok(url)
    }
}
