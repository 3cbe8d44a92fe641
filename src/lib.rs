#[macro_use]
extern crate rocket;
#[macro_use]
extern crate serde;

use std::sync::Arc;

use error::BackendError;
use mongodb::Client;
use rocket::data::{Limits, ToByteUnit};
use rocket::http::Method;
use rocket::{Build, Rocket};
use rocket_cors::{AllowedHeaders, AllowedOrigins};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use crate::config::Config;
use crate::data::user::HttpUserDirectory;
use crate::error::ConfigurationError;
use crate::route::mount_api;
use crate::service::ClassroomService;

pub mod blob;
pub mod config;
pub mod data;
pub mod error;
pub mod middleware;
pub mod resp;
pub mod route;
pub mod service;
pub mod util;

#[cfg(test)]
pub mod testing;

/// Loads configuration, connects the backing services and returns the server ready to launch.
pub async fn create(log_level: Option<Level>) -> Result<Rocket<Build>, BackendError> {
    if let Some(l) = log_level {
        let subscriber = FmtSubscriber::builder().with_max_level(l).finish();

        if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
            eprintln!("Unable to set global logger: {}", err);
        };
        if let Err(err) = tracing_log::LogTracer::init() {
            eprintln!("Unable to forward log records: {}", err);
        }
    }

    tracing::info!("Reading .env file...");
    if dotenv::dotenv().is_err() {
        tracing::warn!("Unable to load .env file.");
    }

    tracing::info!("Loading configuration...");
    let c = match Config::load() {
        Ok(c) => {
            tracing::info!("Configuration loaded.");
            c
        }
        Err(ConfigurationError::NotFound(_)) => {
            let c = Config::default();
            if c.save().is_err() {
                tracing::warn!("Unable to save generated configuration.");
            }
            c
        }
        Err(other) => {
            tracing::error!("Configuration error: {}", other);
            return Err(other.into());
        }
    };

    tracing::info!("Connecting to MongoDB: {}", c.mongodb_uri);
    let client = Client::with_uri_str(c.mongodb_uri.as_str()).await?;

    tracing::info!("Using MongoDB database: {}", c.mongodb_db);
    let db = client.database(c.mongodb_db.as_str());

    if let Err(e) = db.list_collection_names(None).await {
        tracing::error!("Unable to connect to MongoDB.");
        return Err(BackendError::Unreachable(e.to_string()));
    }
    data::classroom::db::ensure_indexes(&db)
        .await
        .map_err(|e| BackendError::Unreachable(e.to_string()))?;

    tracing::info!("Using user-service at {}", c.user_service_url);
    let users = HttpUserDirectory::new(&c.user_service_url, c.upstream_timeout())?;

    tracing::info!("Using {:?} blob store", c.blob_store);
    let blobs = blob::from_config(&c)?;

    let service = ClassroomService::new(Arc::new(db), Arc::new(users), blobs);

    Ok(build(c, service))
}

/// Assembles the HTTP server around an already wired [`ClassroomService`].
pub fn build(c: Config, service: ClassroomService) -> Rocket<Build> {
    let upload_limit = c.max_upload_mib.mebibytes();
    let limits = Limits::default()
        .limit("file", upload_limit)
        .limit("data-form", upload_limit + 1.mebibytes());
    let figment = rocket::Config::figment().merge(("limits", limits));

    tracing::info!("Starting HTTP server...");
    let mut r = rocket::custom(figment);

    tracing::info!("Setting up CORS...");
    match (rocket_cors::CorsOptions {
        allowed_origins: AllowedOrigins::All,
        allowed_methods: vec![Method::Get, Method::Put, Method::Post, Method::Delete]
            .into_iter()
            .map(From::from)
            .collect(),
        allowed_headers: AllowedHeaders::All,
        allow_credentials: true,
        ..Default::default()
    })
    .to_cors()
    {
        Ok(cors) => r = r.attach(cors),
        Err(e) => tracing::error!("Unable to configure CORS: {}", e),
    }

    r = mount_api(r, &c);
    r.manage(c).manage(service)
}
