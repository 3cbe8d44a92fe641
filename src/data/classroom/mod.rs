use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::ClassroomError;

pub mod code;
pub mod db;

pub static CLASSROOM_COLLECTION_NAME: &str = "classrooms";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum MaterialType {
    Text,
    File,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Material {
    #[serde(default = "Uuid::new_v4", with = "crate::data::uuid_string")]
    pub id: Uuid,
    pub title: String,
    #[serde(rename = "type")]
    pub material_type: MaterialType,
    #[serde(default)]
    pub text_content: Option<String>,
    #[serde(default)]
    pub file_url: Option<String>,
    #[serde(default = "Utc::now")]
    pub uploaded_at: DateTime<Utc>,
}

impl Material {
    pub fn text(title: impl ToString, text_content: Option<String>) -> Material {
        Material {
            id: Uuid::new_v4(),
            title: title.to_string(),
            material_type: MaterialType::Text,
            text_content,
            file_url: None,
            uploaded_at: Utc::now(),
        }
    }

    /// A file material only carries the URL; any accompanying text is dropped.
    pub fn file(title: impl ToString, file_url: impl ToString) -> Material {
        Material {
            id: Uuid::new_v4(),
            title: title.to_string(),
            material_type: MaterialType::File,
            text_content: None,
            file_url: Some(file_url.to_string()),
            uploaded_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    #[serde(default = "Uuid::new_v4", with = "crate::data::uuid_string")]
    pub id: Uuid,
    pub title: String,
    #[serde(default)]
    pub materials: Vec<Material>,
}

impl Section {
    pub fn new(title: impl ToString) -> Section {
        Section {
            id: Uuid::new_v4(),
            title: title.to_string(),
            materials: vec![],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    #[serde(default = "Uuid::new_v4", with = "crate::data::uuid_string")]
    pub id: Uuid,
    pub student_id: String,
    pub student_name: String,
    pub submitted_file_url: String,
    #[serde(default = "Utc::now")]
    pub submitted_at: DateTime<Utc>,
    #[serde(default)]
    pub grade: Option<i32>,
    #[serde(default)]
    pub feedback: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    #[serde(default = "Uuid::new_v4", with = "crate::data::uuid_string")]
    pub id: Uuid,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub points: i32,
    #[serde(default = "Utc::now")]
    pub posted_at: DateTime<Utc>,
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub submissions: Vec<Submission>,
}

impl Assignment {
    /// Stores `submission`, replacing whatever the same student handed in before.
    pub fn resubmit(&mut self, submission: Submission) {
        self.submissions
            .retain(|it| it.student_id != submission.student_id);
        self.submissions.push(submission);
    }

    pub fn submission_of(&self, student_id: &str) -> Option<&Submission> {
        self.submissions.iter().find(|it| it.student_id == student_id)
    }
}

/// Root aggregate. Sections, materials, assignments and submissions only exist
/// embedded in a classroom and are always loaded and stored together with it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Classroom {
    #[serde(with = "crate::data::uuid_string")]
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: String,

    pub faculty_id: String,
    pub faculty_name: String,
    pub classroom_code: String,
    pub created_at: DateTime<Utc>,

    #[serde(default)]
    pub sections: Vec<Section>,
    #[serde(default)]
    pub assignments: Vec<Assignment>,
    #[serde(default)]
    pub student_ids: Vec<String>,

    /// Incremented on every successful store; writes against an older version are rejected.
    #[serde(default)]
    pub version: i64,
}

impl Classroom {
    pub fn is_owned_by(&self, user_id: &str) -> bool {
        self.faculty_id == user_id
    }

    pub fn is_enrolled(&self, user_id: &str) -> bool {
        self.student_ids.iter().any(|it| it == user_id)
    }

    pub fn enroll(&mut self, user_id: impl ToString) -> Result<(), ClassroomError> {
        let user_id = user_id.to_string();
        if self.is_enrolled(&user_id) {
            return Err(ClassroomError::Conflict(
                "student is already enrolled in this classroom".to_string(),
            ));
        }
        self.student_ids.push(user_id);
        Ok(())
    }

    pub fn section_mut(&mut self, section_id: Uuid) -> Result<&mut Section, ClassroomError> {
        self.sections
            .iter_mut()
            .find(|it| it.id == section_id)
            .ok_or_else(|| ClassroomError::not_found("section", section_id))
    }

    pub fn remove_section(&mut self, section_id: Uuid) -> Result<Section, ClassroomError> {
        let index = self
            .sections
            .iter()
            .position(|it| it.id == section_id)
            .ok_or_else(|| ClassroomError::not_found("section", section_id))?;
        Ok(self.sections.remove(index))
    }

    pub fn assignment(&self, assignment_id: Uuid) -> Result<&Assignment, ClassroomError> {
        self.assignments
            .iter()
            .find(|it| it.id == assignment_id)
            .ok_or_else(|| ClassroomError::not_found("assignment", assignment_id))
    }

    pub fn assignment_mut(
        &mut self,
        assignment_id: Uuid,
    ) -> Result<&mut Assignment, ClassroomError> {
        self.assignments
            .iter_mut()
            .find(|it| it.id == assignment_id)
            .ok_or_else(|| ClassroomError::not_found("assignment", assignment_id))
    }
}
