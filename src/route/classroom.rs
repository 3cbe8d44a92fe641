use rocket::form::{self, Form};
use rocket::fs::TempFile;
use rocket::response::status::Created;
use rocket::serde::json::{self, Json};
use rocket::State;
use tokio::io::AsyncReadExt;
use uuid::Uuid;

use crate::blob::FileUpload;
use crate::data::classroom::db::{AssignmentCreateData, ClassroomCreateData, SectionCreateData};
use crate::data::classroom::Classroom;
use crate::middleware::user_email::UserEmail;
use crate::resp::problem::{problems, Problem};
use crate::service::{ClassroomService, MaterialData};

#[derive(Debug, FromForm)]
pub struct MaterialUpload<'r> {
    pub title: String,
    #[field(name = "textContent")]
    pub text_content: Option<String>,
    pub file: Option<TempFile<'r>>,
}

#[derive(Debug, FromForm)]
pub struct SubmissionUpload<'r> {
    pub file: TempFile<'r>,
}

pub(crate) fn json_problem(e: json::Error<'_>) -> Problem {
    problems::parse_problem().detail(e.to_string()).clone()
}

fn form_problem(e: form::Errors<'_>) -> Problem {
    problems::parse_problem().detail(e.to_string()).clone()
}

/// Reads a multipart file part into memory together with its client side metadata.
async fn read_upload(file: &TempFile<'_>) -> Result<FileUpload, Problem> {
    let mut bytes = Vec::with_capacity(file.len() as usize);
    if file.len() > 0 {
        let reader = file.open().await?;
        tokio::pin!(reader);
        reader.read_to_end(&mut bytes).await?;
    }

    Ok(FileUpload {
        bytes,
        content_type: file.content_type().map(|it| it.to_string()),
        filename: file
            .raw_name()
            .map(|it| it.dangerous_unsafe_unsanitized_raw().as_str().to_string()),
    })
}

/// Create a classroom owned by the calling faculty member
#[utoipa::path(
    request_body = ClassroomCreateData,
    params(
        ("X-User-Email" = String, Header, description = "Email of the creating faculty member")
    ),
    responses(
        (status = 201, description = "Created classroom with its join code", body = Classroom),
        (status = 400, description = "Malformed body or missing identity", body = Problem),
        (status = 404, description = "Faculty member doesn't exist", body = Problem),
    )
)]
#[post("/classrooms/create", format = "json", data = "<classroom>")]
#[tracing::instrument(skip(service))]
pub async fn classroom_create(
    classroom: Result<Json<ClassroomCreateData>, json::Error<'_>>,
    user: UserEmail,
    service: &State<ClassroomService>,
) -> Result<Created<Json<Classroom>>, Problem> {
    let data = classroom.map_err(json_problem)?.into_inner();
    let created = service.create_classroom(data, user.as_str()).await?;

    Ok(Created::new(format!("/api/classrooms/{}", created.id)).body(Json(created)))
}

/// Get classroom information
#[utoipa::path(
    params(
        ("id" = Uuid, Path, description = "classroom ID")
    ),
    responses(
        (status = 200, description = "The whole classroom", body = Classroom),
        (status = 404, description = "Querried classroom doesn't exist", body = Problem),
    )
)]
#[get("/classrooms/<id>")]
#[tracing::instrument(skip(service))]
pub async fn classroom_get(
    id: Uuid,
    service: &State<ClassroomService>,
) -> Result<Json<Classroom>, Problem> {
    service
        .get_classroom(id)
        .await?
        .map(Json)
        .ok_or_else(|| problems::classroom_not_found(id))
}

/// Add a section to a classroom
#[utoipa::path(
    request_body = SectionCreateData,
    params(
        ("id" = Uuid, Path, description = "classroom ID"),
        ("X-User-Email" = String, Header, description = "Email of the owning faculty member")
    ),
    responses(
        (status = 200, description = "Updated classroom", body = Classroom),
        (status = 403, description = "Caller doesn't own the classroom", body = Problem),
        (status = 404, description = "Classroom or user doesn't exist", body = Problem),
    )
)]
#[post("/classrooms/<id>/sections", format = "json", data = "<section>")]
#[tracing::instrument(skip(service))]
pub async fn section_add(
    id: Uuid,
    section: Result<Json<SectionCreateData>, json::Error<'_>>,
    user: UserEmail,
    service: &State<ClassroomService>,
) -> Result<Json<Classroom>, Problem> {
    let data = section.map_err(json_problem)?.into_inner();
    Ok(Json(service.add_section(id, data, user.as_str()).await?))
}

/// Delete a section and all of its materials
#[utoipa::path(
    params(
        ("id" = Uuid, Path, description = "classroom ID"),
        ("section_id" = Uuid, Path, description = "section ID"),
        ("X-User-Email" = String, Header, description = "Email of the owning faculty member")
    ),
    responses(
        (status = 200, description = "Updated classroom", body = Classroom),
        (status = 403, description = "Caller doesn't own the classroom", body = Problem),
        (status = 404, description = "Classroom or section doesn't exist", body = Problem),
    )
)]
#[delete("/classrooms/<id>/sections/<section_id>")]
#[tracing::instrument(skip(service))]
pub async fn section_delete(
    id: Uuid,
    section_id: Uuid,
    user: UserEmail,
    service: &State<ClassroomService>,
) -> Result<Json<Classroom>, Problem> {
    Ok(Json(
        service
            .delete_section(id, section_id, user.as_str())
            .await?,
    ))
}

/// Create an assignment
#[utoipa::path(
    request_body = AssignmentCreateData,
    params(
        ("id" = Uuid, Path, description = "classroom ID"),
        ("X-User-Email" = String, Header, description = "Email of the owning faculty member")
    ),
    responses(
        (status = 200, description = "Updated classroom", body = Classroom),
        (status = 400, description = "Blank title or negative points", body = Problem),
        (status = 403, description = "Caller doesn't own the classroom", body = Problem),
        (status = 404, description = "Classroom or user doesn't exist", body = Problem),
    )
)]
#[post("/classrooms/<id>/assignments", format = "json", data = "<assignment>")]
#[tracing::instrument(skip(service))]
pub async fn assignment_create(
    id: Uuid,
    assignment: Result<Json<AssignmentCreateData>, json::Error<'_>>,
    user: UserEmail,
    service: &State<ClassroomService>,
) -> Result<Json<Classroom>, Problem> {
    let data = assignment.map_err(json_problem)?.into_inner();
    Ok(Json(service.create_assignment(id, data, user.as_str()).await?))
}

/// Add text or file material to a section
#[utoipa::path(
    request_body(content = Object, content_type = "multipart/form-data"),
    params(
        ("id" = Uuid, Path, description = "classroom ID"),
        ("section_id" = Uuid, Path, description = "section ID"),
        ("X-User-Email" = String, Header, description = "Email of the owning faculty member")
    ),
    responses(
        (status = 200, description = "Updated classroom", body = Classroom),
        (status = 403, description = "Caller doesn't own the classroom", body = Problem),
        (status = 404, description = "Classroom or section doesn't exist", body = Problem),
    )
)]
#[post("/classrooms/<id>/sections/<section_id>/materials", data = "<material>")]
#[tracing::instrument(skip(service, material))]
pub async fn material_add(
    id: Uuid,
    section_id: Uuid,
    material: Result<Form<MaterialUpload<'_>>, form::Errors<'_>>,
    user: UserEmail,
    service: &State<ClassroomService>,
) -> Result<Json<Classroom>, Problem> {
    let material = material.map_err(form_problem)?.into_inner();

    let file = match &material.file {
        Some(file) => Some(read_upload(file).await?),
        None => None,
    };
    let data = MaterialData {
        title: material.title,
        text_content: material.text_content,
    };

    Ok(Json(
        service
            .add_material(id, section_id, data, file, user.as_str())
            .await?,
    ))
}

/// Submit (or resubmit) a file for an assignment
#[utoipa::path(
    request_body(content = Object, content_type = "multipart/form-data"),
    params(
        ("id" = Uuid, Path, description = "classroom ID"),
        ("assignment_id" = Uuid, Path, description = "assignment ID"),
        ("X-User-Email" = String, Header, description = "Email of the submitting student")
    ),
    responses(
        (status = 200, description = "Updated classroom", body = Classroom),
        (status = 400, description = "Missing or empty file", body = Problem),
        (status = 403, description = "Student isn't enrolled", body = Problem),
        (status = 404, description = "Classroom or assignment doesn't exist", body = Problem),
    )
)]
#[post("/classrooms/<id>/assignments/<assignment_id>/submit", data = "<submission>")]
#[tracing::instrument(skip(service, submission))]
pub async fn assignment_submit(
    id: Uuid,
    assignment_id: Uuid,
    submission: Result<Form<SubmissionUpload<'_>>, form::Errors<'_>>,
    user: UserEmail,
    service: &State<ClassroomService>,
) -> Result<Json<Classroom>, Problem> {
    let submission = submission.map_err(form_problem)?.into_inner();
    let file = read_upload(&submission.file).await?;

    Ok(Json(
        service
            .submit_assignment(id, assignment_id, file, user.as_str())
            .await?,
    ))
}
