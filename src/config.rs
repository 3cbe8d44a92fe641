use crate::error::ConfigurationError;
use crate::util;
use std::env;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

fn default_mongodb_uri() -> String {
    env::var("MONGODB_URI").unwrap_or("mongodb://localhost:27017".to_string())
}

fn default_mongodb_db() -> String {
    env::var("MONGODB_DB_NAME").unwrap_or("classroom".to_string())
}

fn default_user_service_url() -> String {
    env::var("USER_SERVICE_URL").unwrap_or("http://localhost:8081".to_string())
}

fn default_upstream_timeout_secs() -> u64 {
    env::var("UPSTREAM_TIMEOUT_SECS")
        .ok()
        .and_then(|it| it.parse().ok())
        .unwrap_or(10)
}

fn default_blob_store() -> BlobStoreKind {
    match env::var("AZURE_CONTAINER_URL") {
        Ok(_) => BlobStoreKind::Azure,
        Err(_) => BlobStoreKind::Local,
    }
}

fn default_upload_dir() -> PathBuf {
    PathBuf::from(env::var("UPLOAD_DIR").unwrap_or("./uploads".to_string()))
}

fn default_public_base_url() -> String {
    env::var("PUBLIC_BASE_URL").unwrap_or("http://localhost:8000".to_string())
}

fn default_max_upload_mib() -> u64 {
    env::var("MAX_UPLOAD_MIB")
        .ok()
        .and_then(|it| it.parse().ok())
        .unwrap_or(32)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlobStoreKind {
    Local,
    Azure,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(skip)]
    file_path: PathBuf,

    #[serde(default = "default_mongodb_uri")]
    pub mongodb_uri: String,
    #[serde(default = "default_mongodb_db")]
    pub mongodb_db: String,

    /// Base URL of the user-service resolving `X-User-Email` identities.
    #[serde(default = "default_user_service_url")]
    pub user_service_url: String,
    #[serde(default = "default_upstream_timeout_secs")]
    pub upstream_timeout_secs: u64,

    #[serde(default = "default_blob_store")]
    pub blob_store: BlobStoreKind,
    #[serde(default = "default_upload_dir")]
    pub upload_dir: PathBuf,
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,
    #[serde(default = "env_azure_container_url")]
    pub azure_container_url: Option<String>,
    #[serde(default = "env_azure_sas_token")]
    pub azure_sas_token: Option<String>,

    #[serde(default = "default_max_upload_mib")]
    pub max_upload_mib: u64,
}

fn env_azure_container_url() -> Option<String> {
    env::var("AZURE_CONTAINER_URL").ok()
}

fn env_azure_sas_token() -> Option<String> {
    env::var("AZURE_SAS_TOKEN").ok()
}

impl Default for Config {
    fn default() -> Self {
        Config {
            file_path: config_dir().join("settings.yml"),
            mongodb_uri: default_mongodb_uri(),
            mongodb_db: default_mongodb_db(),
            user_service_url: default_user_service_url(),
            upstream_timeout_secs: default_upstream_timeout_secs(),
            blob_store: default_blob_store(),
            upload_dir: default_upload_dir(),
            public_base_url: default_public_base_url(),
            azure_container_url: env_azure_container_url(),
            azure_sas_token: env_azure_sas_token(),
            max_upload_mib: default_max_upload_mib(),
        }
    }
}

#[inline]
fn config_dir() -> PathBuf {
    PathBuf::from(env::var("CONFIG_DIR").unwrap_or("./config".to_string()))
}

impl Config {
    pub fn load() -> Result<Config, ConfigurationError> {
        let config_file = util::find_first_subpath(
            config_dir(),
            &["settings.yml", "settings.yaml"],
            Path::exists,
        )
        .ok_or_else(|| ConfigurationError::NotFound(config_dir()))?;

        let file = File::open(&config_file)?;
        let mut config: Config = serde_yaml::from_reader(BufReader::new(file))?;
        config.file_path = config_file;

        Ok(config)
    }

    pub fn save(&self) -> Result<(), ConfigurationError> {
        if let Some(parent) = self.file_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = File::create(&self.file_path)?;
        let mut out = BufWriter::new(file);
        serde_yaml::to_writer(&mut out, self)?;
        out.flush()?;
        Ok(())
    }

    pub fn upstream_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.upstream_timeout_secs)
    }
}
