use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::blob::{BlobStore, FileUpload};
use crate::data::classroom::code::{self, MAX_CODE_ATTEMPTS};
use crate::data::classroom::db::{
    AssignmentCreateData, ClassroomCreateData, ClassroomStore, Inserted, SectionCreateData,
};
use crate::data::classroom::{Assignment, Classroom, Material, Section, Submission};
use crate::data::user::{UserDirectory, UserRecord};
use crate::error::ClassroomError;

/// How often a mutation is re-applied after losing a race against a concurrent write.
pub const MAX_SAVE_ATTEMPTS: usize = 5;

/// Title and optional text of a material; the file travels separately.
#[derive(Debug, Clone)]
pub struct MaterialData {
    pub title: String,
    pub text_content: Option<String>,
}

/// Classroom workflows. Every mutation loads the whole aggregate, applies the change in
/// memory and writes it back guarded by the aggregate's version.
#[derive(Clone)]
pub struct ClassroomService {
    store: Arc<dyn ClassroomStore>,
    users: Arc<dyn UserDirectory>,
    blobs: Arc<dyn BlobStore>,
}

impl ClassroomService {
    pub fn new(
        store: Arc<dyn ClassroomStore>,
        users: Arc<dyn UserDirectory>,
        blobs: Arc<dyn BlobStore>,
    ) -> Self {
        ClassroomService {
            store,
            users,
            blobs,
        }
    }

    async fn resolve_user(&self, email: &str) -> Result<UserRecord, ClassroomError> {
        let email = email.trim();
        if email.is_empty() {
            return Err(ClassroomError::Validation("user email is required".to_string()));
        }
        self.users.resolve_user(email).await
    }

    async fn load(&self, id: Uuid) -> Result<Classroom, ClassroomError> {
        self.store
            .find_by_id(id)
            .await?
            .ok_or_else(|| ClassroomError::not_found("classroom", id))
    }

    /// Loads a classroom for modification by its owning faculty member.
    async fn load_owned(&self, id: Uuid, faculty_email: &str) -> Result<Classroom, ClassroomError> {
        let classroom = self.load(id).await?;
        let faculty = self.resolve_user(faculty_email).await?;

        if !classroom.is_owned_by(&faculty.id) {
            tracing::warn!("{} tried to modify classroom {} they don't own", faculty.id, id);
            return Err(ClassroomError::PermissionDenied(
                "you are not authorized to modify this classroom".to_string(),
            ));
        }

        Ok(classroom)
    }

    /// Applies `apply` and stores the result. When someone else stored the classroom
    /// first, the fresh copy is reloaded and `apply` runs again on it.
    async fn commit<F>(&self, mut classroom: Classroom, mut apply: F) -> Result<Classroom, ClassroomError>
    where
        F: FnMut(&mut Classroom) -> Result<(), ClassroomError> + Send,
    {
        let id = classroom.id;

        for attempt in 1..=MAX_SAVE_ATTEMPTS {
            apply(&mut classroom)?;

            if let Some(stored) = self.store.replace(&classroom).await? {
                return Ok(stored);
            }

            tracing::debug!(attempt, "classroom {} was modified concurrently, retrying", id);
            classroom = self.load(id).await?;
        }

        Err(ClassroomError::Conflict(
            "classroom is being modified concurrently, try again".to_string(),
        ))
    }

    pub async fn get_classroom(&self, id: Uuid) -> Result<Option<Classroom>, ClassroomError> {
        self.store.find_by_id(id).await
    }

    pub async fn create_classroom(
        &self,
        data: ClassroomCreateData,
        faculty_email: &str,
    ) -> Result<Classroom, ClassroomError> {
        data.validate()?;
        let faculty = self.resolve_user(faculty_email).await?;

        let mut classroom = Classroom {
            id: Uuid::new_v4(),
            name: data.name.trim().to_string(),
            description: data.description,
            faculty_id: faculty.id,
            faculty_name: faculty.name,
            classroom_code: String::new(),
            created_at: Utc::now(),
            sections: vec![],
            assignments: vec![],
            student_ids: vec![],
            version: 0,
        };

        for _ in 0..MAX_CODE_ATTEMPTS {
            let code = code::generate_code();
            if self.store.find_by_code(&code).await?.is_some() {
                continue;
            }

            classroom.classroom_code = code;
            match self.store.insert(&classroom).await? {
                Inserted::Created => {
                    tracing::info!(
                        "classroom {} created by {} with code {}",
                        classroom.id,
                        classroom.faculty_id,
                        classroom.classroom_code
                    );
                    return Ok(classroom);
                }
                Inserted::CodeTaken => {
                    tracing::debug!("code {} taken concurrently", classroom.classroom_code)
                }
            }
        }

        tracing::error!(
            "no free classroom code found in {} attempts; code space may be exhausted",
            MAX_CODE_ATTEMPTS
        );
        Err(ClassroomError::CodeSpaceExhausted(MAX_CODE_ATTEMPTS))
    }

    pub async fn add_section(
        &self,
        classroom_id: Uuid,
        data: SectionCreateData,
        faculty_email: &str,
    ) -> Result<Classroom, ClassroomError> {
        data.validate()?;
        let classroom = self.load_owned(classroom_id, faculty_email).await?;

        let section = Section::from(data);
        let updated = self
            .commit(classroom, |c| {
                c.sections.push(section.clone());
                Ok(())
            })
            .await?;

        tracing::info!("section {} added to classroom {}", section.id, classroom_id);
        Ok(updated)
    }

    pub async fn delete_section(
        &self,
        classroom_id: Uuid,
        section_id: Uuid,
        faculty_email: &str,
    ) -> Result<Classroom, ClassroomError> {
        let classroom = self.load_owned(classroom_id, faculty_email).await?;

        let updated = self
            .commit(classroom, |c| c.remove_section(section_id).map(|_| ()))
            .await?;

        tracing::info!("section {} removed from classroom {}", section_id, classroom_id);
        Ok(updated)
    }

    pub async fn create_assignment(
        &self,
        classroom_id: Uuid,
        data: AssignmentCreateData,
        faculty_email: &str,
    ) -> Result<Classroom, ClassroomError> {
        data.validate()?;
        let classroom = self.load_owned(classroom_id, faculty_email).await?;

        let assignment = Assignment::from(data);
        let updated = self
            .commit(classroom, |c| {
                c.assignments.push(assignment.clone());
                Ok(())
            })
            .await?;

        tracing::info!("assignment {} created in classroom {}", assignment.id, classroom_id);
        Ok(updated)
    }

    /// Adds a material to a section. A non-empty `file` makes it a file material,
    /// otherwise it is a text material.
    pub async fn add_material(
        &self,
        classroom_id: Uuid,
        section_id: Uuid,
        data: MaterialData,
        file: Option<FileUpload>,
        faculty_email: &str,
    ) -> Result<Classroom, ClassroomError> {
        if data.title.trim().is_empty() {
            return Err(ClassroomError::Validation(
                "material title must not be blank".to_string(),
            ));
        }

        let mut classroom = self.load_owned(classroom_id, faculty_email).await?;
        // Fail before uploading anything.
        classroom.section_mut(section_id)?;

        let title = data.title.trim();
        let material = match file.filter(|it| !it.is_empty()) {
            Some(file) => Material::file(title, self.blobs.upload(file).await?),
            None => Material::text(title, data.text_content),
        };

        let updated = self
            .commit(classroom, |c| {
                c.section_mut(section_id)?.materials.push(material.clone());
                Ok(())
            })
            .await?;

        tracing::info!(
            "{:?} material {} added to section {}",
            material.material_type,
            material.id,
            section_id
        );
        Ok(updated)
    }

    pub async fn join_classroom(
        &self,
        classroom_code: &str,
        student_email: &str,
    ) -> Result<Classroom, ClassroomError> {
        let classroom_code = code::normalize(classroom_code);
        if classroom_code.is_empty() {
            return Err(ClassroomError::Validation(
                "classroom code is required".to_string(),
            ));
        }

        let student = self.resolve_user(student_email).await?;
        let classroom = self
            .store
            .find_by_code(&classroom_code)
            .await?
            .ok_or_else(|| ClassroomError::not_found("classroom", &classroom_code))?;

        let classroom_id = classroom.id;
        let updated = self
            .commit(classroom, |c| c.enroll(&student.id))
            .await
            .map_err(|e| {
                if let ClassroomError::Conflict(_) = e {
                    tracing::warn!("{} is already enrolled in {}", student.id, classroom_id);
                }
                e
            })?;

        tracing::info!("student {} joined classroom {}", student.id, classroom_id);
        Ok(updated)
    }

    pub async fn classrooms_for_student(
        &self,
        student_email: &str,
    ) -> Result<Vec<Classroom>, ClassroomError> {
        let student = self.resolve_user(student_email).await?;
        self.store.find_by_student(&student.id).await
    }

    /// Stores a student's file for an assignment, replacing their earlier submission.
    pub async fn submit_assignment(
        &self,
        classroom_id: Uuid,
        assignment_id: Uuid,
        file: FileUpload,
        student_email: &str,
    ) -> Result<Classroom, ClassroomError> {
        if file.is_empty() {
            return Err(ClassroomError::Validation(
                "submission file must not be empty".to_string(),
            ));
        }

        let student = self.resolve_user(student_email).await?;
        let classroom = self.load(classroom_id).await?;

        if !classroom.is_enrolled(&student.id) {
            tracing::warn!("{} submitted to {} without enrolling", student.id, classroom_id);
            return Err(ClassroomError::PermissionDenied(
                "you are not enrolled in this classroom".to_string(),
            ));
        }
        classroom.assignment(assignment_id)?;

        let submission = Submission {
            id: Uuid::new_v4(),
            student_id: student.id.clone(),
            student_name: student.name.clone(),
            submitted_file_url: self.blobs.upload(file).await?,
            submitted_at: Utc::now(),
            grade: None,
            feedback: None,
        };

        let updated = self
            .commit(classroom, |c| {
                c.assignment_mut(assignment_id)?
                    .resubmit(submission.clone());
                Ok(())
            })
            .await?;

        tracing::info!(
            "student {} submitted assignment {} in classroom {}",
            student.id,
            assignment_id,
            classroom_id
        );
        Ok(updated)
    }
}
