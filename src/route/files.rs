use rocket::fs::NamedFile;
use rocket::response::{self, Responder};
use rocket::{Request, State};

use crate::config::Config;
use crate::util::sanitize_file_name;

/// Locally stored upload, shown in the browser rather than downloaded.
pub struct InlineFile(NamedFile);

impl<'r> Responder<'r, 'static> for InlineFile {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'static> {
        let mut response = self.0.respond_to(req)?;
        response.set_raw_header("Content-Disposition", "inline");
        Ok(response)
    }
}

#[get("/uploads/<name>")]
pub async fn upload_get(name: &str, c: &State<Config>) -> Option<InlineFile> {
    // Only names the local blob store could have produced.
    if sanitize_file_name(name) != name {
        return None;
    }

    NamedFile::open(c.upload_dir.join(name))
        .await
        .ok()
        .map(InlineFile)
}
