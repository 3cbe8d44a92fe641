use bson::doc;
use chrono::{DateTime, Utc};
use mongodb::error::{ErrorKind, WriteError, WriteFailure};
use mongodb::options::IndexOptions;
use mongodb::{Collection, Database, IndexModel};
use rocket::futures::TryStreamExt;
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use super::{Assignment, Classroom, Section, CLASSROOM_COLLECTION_NAME};
use crate::error::ClassroomError;

const DUPLICATE_KEY: i32 = 11000;

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClassroomCreateData {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SectionCreateData {
    pub title: String,
}

impl From<SectionCreateData> for Section {
    fn from(value: SectionCreateData) -> Self {
        Section::new(value.title.trim())
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentCreateData {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub points: i32,
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
}

impl From<AssignmentCreateData> for Assignment {
    fn from(value: AssignmentCreateData) -> Self {
        Assignment {
            id: Uuid::new_v4(),
            title: value.title.trim().to_string(),
            description: value.description,
            points: value.points,
            posted_at: Utc::now(),
            due_date: value.due_date,
            submissions: vec![],
        }
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct JoinData {
    pub classroom_code: String,
}

fn require_title(title: &str, what: &str) -> Result<(), ClassroomError> {
    if title.trim().is_empty() {
        return Err(ClassroomError::Validation(format!("{} must not be blank", what)));
    }
    Ok(())
}

impl ClassroomCreateData {
    pub fn validate(&self) -> Result<(), ClassroomError> {
        require_title(&self.name, "classroom name")
    }
}

impl SectionCreateData {
    pub fn validate(&self) -> Result<(), ClassroomError> {
        require_title(&self.title, "section title")
    }
}

impl AssignmentCreateData {
    pub fn validate(&self) -> Result<(), ClassroomError> {
        require_title(&self.title, "assignment title")?;
        if self.points < 0 {
            return Err(ClassroomError::Validation(
                "assignment points must not be negative".to_string(),
            ));
        }
        Ok(())
    }
}

/// Result of inserting a new classroom.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Inserted {
    Created,
    /// Another classroom already uses the join code.
    CodeTaken,
}

/// Persistence for whole classroom aggregates.
#[rocket::async_trait]
pub trait ClassroomStore: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Classroom>, ClassroomError>;

    async fn find_by_code(&self, code: &str) -> Result<Option<Classroom>, ClassroomError>;

    /// All classrooms whose member list contains `student_id`.
    async fn find_by_student(&self, student_id: &str) -> Result<Vec<Classroom>, ClassroomError>;

    async fn insert(&self, classroom: &Classroom) -> Result<Inserted, ClassroomError>;

    /// Stores `classroom` if the stored copy still has `classroom.version`. Returns the
    /// stored aggregate with its bumped version, or `None` if it was changed meanwhile.
    async fn replace(&self, classroom: &Classroom) -> Result<Option<Classroom>, ClassroomError>;
}

pub mod filter {
    use bson::{doc, Document};
    use uuid::Uuid;

    #[inline]
    pub fn by_id(id: Uuid) -> Document {
        doc! { "id": id.hyphenated().to_string() }
    }

    #[inline]
    pub fn by_code(code: &str) -> Document {
        doc! { "classroomCode": code }
    }

    /// Matches array membership.
    #[inline]
    pub fn by_student(student_id: &str) -> Document {
        doc! { "studentIds": student_id }
    }

    #[inline]
    pub fn by_id_and_version(id: Uuid, version: i64) -> Document {
        let mut filter = by_id(id);
        filter.insert("version", version);
        filter
    }
}

fn classrooms(db: &Database) -> Collection<Classroom> {
    db.collection(CLASSROOM_COLLECTION_NAME)
}

fn is_duplicate_key(e: &mongodb::error::Error) -> bool {
    matches!(
        e.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(WriteError {
            code: DUPLICATE_KEY,
            ..
        }))
    )
}

/// Creates the indexes the store relies on. The unique `classroomCode` index is what
/// actually guarantees join code uniqueness between concurrent creations.
pub async fn ensure_indexes(db: &Database) -> Result<(), ClassroomError> {
    let unique = || IndexOptions::builder().unique(true).build();

    classrooms(db)
        .create_indexes(
            [
                IndexModel::builder()
                    .keys(doc! { "id": 1 })
                    .options(unique())
                    .build(),
                IndexModel::builder()
                    .keys(doc! { "classroomCode": 1 })
                    .options(unique())
                    .build(),
                IndexModel::builder().keys(doc! { "studentIds": 1 }).build(),
            ],
            None,
        )
        .await?;

    Ok(())
}

#[rocket::async_trait]
impl ClassroomStore for Database {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Classroom>, ClassroomError> {
        Ok(classrooms(self).find_one(filter::by_id(id), None).await?)
    }

    async fn find_by_code(&self, code: &str) -> Result<Option<Classroom>, ClassroomError> {
        Ok(classrooms(self).find_one(filter::by_code(code), None).await?)
    }

    async fn find_by_student(&self, student_id: &str) -> Result<Vec<Classroom>, ClassroomError> {
        let cursor = classrooms(self)
            .find(filter::by_student(student_id), None)
            .await?;
        let found: Vec<Classroom> = cursor.try_collect().await?;
        Ok(found)
    }

    async fn insert(&self, classroom: &Classroom) -> Result<Inserted, ClassroomError> {
        match classrooms(self).insert_one(classroom, None).await {
            Ok(_) => Ok(Inserted::Created),
            Err(e) if is_duplicate_key(&e) => Ok(Inserted::CodeTaken),
            Err(e) => Err(e.into()),
        }
    }

    async fn replace(&self, classroom: &Classroom) -> Result<Option<Classroom>, ClassroomError> {
        let mut next = classroom.clone();
        next.version = classroom.version + 1;

        let result = classrooms(self)
            .replace_one(
                filter::by_id_and_version(classroom.id, classroom.version),
                &next,
                None,
            )
            .await?;

        if result.matched_count == 0 {
            return Ok(None);
        }
        Ok(Some(next))
    }
}
