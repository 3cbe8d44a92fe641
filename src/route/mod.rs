use std::collections::BTreeMap;

use rocket::http::Status;
use rocket::{Build, Request, Rocket, Route};

pub mod classroom;
pub mod files;
pub mod student;

use classroom::*;
use files::*;
use student::*;

use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    config::{BlobStoreKind, Config},
    data::classroom::{
        db::{AssignmentCreateData, ClassroomCreateData, JoinData, SectionCreateData},
        Assignment, Classroom, Material, MaterialType, Section, Submission,
    },
    resp::problem::{CaughtProblem, Problem},
};

#[derive(OpenApi)]
#[openapi(
    paths(
        classroom_create,
        classroom_get,
        section_add,
        section_delete,
        assignment_create,
        material_add,
        assignment_submit,
        classroom_join,
        student_classrooms
    ),
    components(schemas(
        Classroom,
        Section,
        Material,
        MaterialType,
        Assignment,
        Submission,
        ClassroomCreateData,
        SectionCreateData,
        AssignmentCreateData,
        JoinData,
        Problem
    )),
    modifiers(&API_PREFIX)
)]
pub struct ApiDoc;

pub struct PathPrefix(pub &'static str);
static API_PREFIX: PathPrefix = PathPrefix("/api");

impl utoipa::Modify for PathPrefix {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let mut new_paths = BTreeMap::new();

        for (path, item) in std::mem::take(&mut openapi.paths.paths) {
            new_paths.insert(self.0.to_string() + &path, item);
        }

        openapi.paths.paths = new_paths;
    }
}

pub fn api() -> Vec<Route> {
    routes![
        classroom_create,
        classroom_get,
        section_add,
        section_delete,
        assignment_create,
        material_add,
        assignment_submit,
        classroom_join,
        student_classrooms
    ]
}

/// Renders framework errors (unmatched routes, failed guards, oversized bodies) as problems.
#[catch(default)]
pub fn problem_catcher(status: Status, req: &Request<'_>) -> Problem {
    match &req.local_cache(|| CaughtProblem(None)).0 {
        Some(problem) if problem.status == status => problem.clone(),
        _ => Problem::new_untyped(status, status.reason().unwrap_or("Request failed.")),
    }
}

pub fn mount_api(rocket: Rocket<Build>, c: &Config) -> Rocket<Build> {
    let rocket = rocket
        .mount("/api", api())
        .mount(
            "/",
            SwaggerUi::new("/swagger/<_..>").url("/api/openapi.json", ApiDoc::openapi()),
        )
        .register("/", catchers![problem_catcher]);

    match c.blob_store {
        BlobStoreKind::Local => rocket.mount("/", routes![upload_get]),
        BlobStoreKind::Azure => rocket,
    }
}

#[cfg(test)]
mod classroom_endpoints {
    use std::sync::Arc;

    use rocket::http::{ContentType, Header, Status};
    use rocket::local::asynchronous::Client;
    use serde_json::{json, Value};

    use crate::config::Config;
    use crate::data::classroom::Classroom;
    use crate::service::ClassroomService;
    use crate::testing::{
        MemoryBlobStore, MemoryClassroomStore, MemoryUserDirectory, FACULTY, OTHER_FACULTY,
        STUDENT,
    };

    const BOUNDARY: &str = "X-CLASSROOM-BOUNDARY";

    async fn client() -> Client {
        let service = ClassroomService::new(
            Arc::new(MemoryClassroomStore::default()),
            Arc::new(MemoryUserDirectory::example()),
            Arc::new(MemoryBlobStore::default()),
        );
        Client::tracked(crate::build(Config::default(), service))
            .await
            .expect("invalid backend")
    }

    fn user(email: &str) -> Header<'static> {
        Header::new("X-User-Email", email.to_string())
    }

    fn multipart() -> ContentType {
        ContentType::new("multipart", "form-data").with_params(("boundary", BOUNDARY))
    }

    /// Builds a multipart body from text fields and an optional `file` part.
    fn multipart_body(fields: &[(&str, &str)], file: Option<(&str, &str)>) -> String {
        let mut body = String::new();
        for (name, value) in fields {
            body += &format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                BOUNDARY, name, value
            );
        }
        if let Some((filename, content)) = file {
            body += &format!(
                "--{}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\nContent-Type: application/pdf\r\n\r\n{}\r\n",
                BOUNDARY, filename, content
            );
        }
        body += &format!("--{}--\r\n", BOUNDARY);
        body
    }

    async fn create_classroom(client: &Client) -> Classroom {
        let response = client
            .post("/api/classrooms/create")
            .header(ContentType::JSON)
            .header(user(FACULTY))
            .body(json!({ "name": "Distributed Systems" }).to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Created);
        response
            .into_json::<Classroom>()
            .await
            .expect("classroom in response")
    }

    #[rocket::async_test]
    async fn create_and_get_classroom() {
        let client = client().await;
        let created = create_classroom(&client).await;

        assert_eq!(created.classroom_code.len(), 6);
        assert_eq!(created.faculty_name, "Prof. Faye");

        let response = client
            .get(format!("/api/classrooms/{}", created.id))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);
        let body: Value = response.into_json().await.expect("json body");
        assert_eq!(body["classroomCode"], created.classroom_code.as_str());
        assert_eq!(body["facultyId"], "faculty-1");
    }

    #[rocket::async_test]
    async fn unknown_classroom_is_problem_404() {
        let client = client().await;

        let response = client
            .get(format!("/api/classrooms/{}", uuid::Uuid::new_v4()))
            .dispatch()
            .await;

        assert_eq!(response.status(), Status::NotFound);
        assert_eq!(
            response.content_type(),
            Some(ContentType::new("application", "problem+json"))
        );
        let body: Value = response.into_json().await.expect("problem body");
        assert_eq!(body["status"], 404);
    }

    #[rocket::async_test]
    async fn missing_identity_header_is_bad_request() {
        let client = client().await;

        let response = client
            .post("/api/classrooms/create")
            .header(ContentType::JSON)
            .body(json!({ "name": "No owner" }).to_string())
            .dispatch()
            .await;

        assert_eq!(response.status(), Status::BadRequest);
        let body: Value = response.into_json().await.expect("problem body");
        assert_eq!(body["title"], "Missing user identity.");
    }

    #[rocket::async_test]
    async fn unknown_user_is_not_found() {
        let client = client().await;

        let response = client
            .post("/api/classrooms/create")
            .header(ContentType::JSON)
            .header(user("ghost@uni.edu"))
            .body(json!({ "name": "Ghost class" }).to_string())
            .dispatch()
            .await;

        assert_eq!(response.status(), Status::NotFound);
    }

    #[rocket::async_test]
    async fn malformed_body_is_bad_request() {
        let client = client().await;

        let response = client
            .post("/api/classrooms/create")
            .header(ContentType::JSON)
            .header(user(FACULTY))
            .body("{\"title\": 3")
            .dispatch()
            .await;

        assert_eq!(response.status(), Status::BadRequest);
    }

    #[rocket::async_test]
    async fn section_lifecycle_and_ownership() {
        let client = client().await;
        let created = create_classroom(&client).await;
        let sections = format!("/api/classrooms/{}/sections", created.id);

        let denied = client
            .post(sections.as_str())
            .header(ContentType::JSON)
            .header(user(OTHER_FACULTY))
            .body(json!({ "title": "Week 1" }).to_string())
            .dispatch()
            .await;
        assert_eq!(denied.status(), Status::Forbidden);

        let response = client
            .post(sections.as_str())
            .header(ContentType::JSON)
            .header(user(FACULTY))
            .body(json!({ "title": "Week 1" }).to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);
        let classroom: Classroom = response.into_json().await.expect("classroom");
        let section_id = classroom.sections[0].id;

        let missing = client
            .delete(format!("{}/{}", sections, uuid::Uuid::new_v4()))
            .header(user(FACULTY))
            .dispatch()
            .await;
        assert_eq!(missing.status(), Status::NotFound);

        let response = client
            .delete(format!("{}/{}", sections, section_id))
            .header(user(FACULTY))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);
        let classroom: Classroom = response.into_json().await.expect("classroom");
        assert!(classroom.sections.is_empty());
    }

    #[rocket::async_test]
    async fn materials_from_multipart() {
        let client = client().await;
        let created = create_classroom(&client).await;

        let response = client
            .post(format!("/api/classrooms/{}/sections", created.id))
            .header(ContentType::JSON)
            .header(user(FACULTY))
            .body(json!({ "title": "Week 1" }).to_string())
            .dispatch()
            .await;
        let classroom: Classroom = response.into_json().await.expect("classroom");
        let materials = format!(
            "/api/classrooms/{}/sections/{}/materials",
            created.id, classroom.sections[0].id
        );

        let response = client
            .post(materials.as_str())
            .header(multipart())
            .header(user(FACULTY))
            .body(multipart_body(
                &[("title", "Reading"), ("textContent", "Chapter 1")],
                None,
            ))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);
        let body: Value = response.into_json().await.expect("json body");
        let text = &body["sections"][0]["materials"][0];
        assert_eq!(text["type"], "TEXT");
        assert_eq!(text["textContent"], "Chapter 1");
        assert!(text["fileUrl"].is_null());

        let response = client
            .post(materials.as_str())
            .header(multipart())
            .header(user(FACULTY))
            .body(multipart_body(
                &[("title", "Slides")],
                Some(("slides.pdf", "%PDF-1.7 slides")),
            ))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);
        let body: Value = response.into_json().await.expect("json body");
        let file = &body["sections"][0]["materials"][1];
        assert_eq!(file["type"], "FILE");
        assert!(file["fileUrl"]
            .as_str()
            .map(|it| it.ends_with("-slides.pdf"))
            .unwrap_or(false));
    }

    #[rocket::async_test]
    async fn join_submit_and_list() {
        let client = client().await;
        let created = create_classroom(&client).await;

        let response = client
            .post(format!("/api/classrooms/{}/assignments", created.id))
            .header(ContentType::JSON)
            .header(user(FACULTY))
            .body(json!({ "title": "Homework 1", "points": 10 }).to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);
        let classroom: Classroom = response.into_json().await.expect("classroom");
        let submit = format!(
            "/api/classrooms/{}/assignments/{}/submit",
            created.id, classroom.assignments[0].id
        );

        let join = json!({ "classroomCode": created.classroom_code }).to_string();
        let response = client
            .post("/api/student/classrooms/join")
            .header(ContentType::JSON)
            .header(user(STUDENT))
            .body(join.as_str())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);

        let again = client
            .post("/api/student/classrooms/join")
            .header(ContentType::JSON)
            .header(user(STUDENT))
            .body(join.as_str())
            .dispatch()
            .await;
        assert_eq!(again.status(), Status::Conflict);

        for name in ["hw.pdf", "hw2.pdf"] {
            let response = client
                .post(submit.as_str())
                .header(multipart())
                .header(user(STUDENT))
                .body(multipart_body(&[], Some((name, "%PDF-1.7 answers"))))
                .dispatch()
                .await;
            assert_eq!(response.status(), Status::Ok);
        }

        let response = client
            .get("/api/student/classrooms")
            .header(user(STUDENT))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);
        let listed: Vec<Classroom> = response.into_json().await.expect("classrooms");
        assert_eq!(listed.len(), 1);

        let submissions = &listed[0].assignments[0].submissions;
        assert_eq!(submissions.len(), 1);
        assert_eq!(submissions[0].student_id, "student-1");
        assert!(submissions[0].submitted_file_url.ends_with("-hw2.pdf"));
    }

    #[rocket::async_test]
    async fn submission_without_file_is_bad_request() {
        let client = client().await;
        let created = create_classroom(&client).await;

        let response = client
            .post(format!(
                "/api/classrooms/{}/assignments/{}/submit",
                created.id,
                uuid::Uuid::new_v4()
            ))
            .header(multipart())
            .header(user(STUDENT))
            .body(multipart_body(&[("note", "forgot the file")], None))
            .dispatch()
            .await;

        assert_eq!(response.status(), Status::BadRequest);
    }

    #[rocket::async_test]
    async fn openapi_document_is_served() {
        let client = client().await;

        let response = client.get("/api/openapi.json").dispatch().await;
        assert_eq!(response.status(), Status::Ok);
        let body: Value = response.into_json().await.expect("openapi json");
        assert!(body["paths"]["/api/classrooms/create"].is_object());
    }
}
