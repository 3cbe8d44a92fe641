use rocket::serde::json::{self, Json};
use rocket::State;

use crate::data::classroom::db::JoinData;
use crate::data::classroom::Classroom;
use crate::middleware::user_email::UserEmail;
use crate::resp::problem::Problem;
use crate::route::classroom::json_problem;
use crate::service::ClassroomService;

/// Join a classroom with its join code
#[utoipa::path(
    request_body = JoinData,
    params(
        ("X-User-Email" = String, Header, description = "Email of the joining student")
    ),
    responses(
        (status = 200, description = "Joined classroom", body = Classroom),
        (status = 404, description = "No classroom uses the code", body = Problem),
        (status = 409, description = "Student is already enrolled", body = Problem),
    )
)]
#[post("/student/classrooms/join", format = "json", data = "<join>")]
#[tracing::instrument(skip(service))]
pub async fn classroom_join(
    join: Result<Json<JoinData>, json::Error<'_>>,
    user: UserEmail,
    service: &State<ClassroomService>,
) -> Result<Json<Classroom>, Problem> {
    let join = join.map_err(json_problem)?.into_inner();
    Ok(Json(
        service
            .join_classroom(&join.classroom_code, user.as_str())
            .await?,
    ))
}

/// List classrooms the calling student is enrolled in
#[utoipa::path(
    params(
        ("X-User-Email" = String, Header, description = "Email of the student")
    ),
    responses(
        (status = 200, description = "Enrolled classrooms", body = Vec<Classroom>),
        (status = 404, description = "Student doesn't exist", body = Problem),
    )
)]
#[get("/student/classrooms")]
#[tracing::instrument(skip(service))]
pub async fn student_classrooms(
    user: UserEmail,
    service: &State<ClassroomService>,
) -> Result<Json<Vec<Classroom>>, Problem> {
    Ok(Json(service.classrooms_for_student(user.as_str()).await?))
}
