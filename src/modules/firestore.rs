use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};
use super::auth::{Credentials, ServiceAccount, ServiceAccountKey};
use super::config::Config;
use super::error::UploadError;
use super::parser::GeoPoint;
use super::uploader::DocumentSink;

pub const FIRESTORE_ENDPOINT: &str = "https://firestore.googleapis.com";

// a Firestore document body as accepted by the REST API: {"fields": {...}}
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Document {
    pub fields: BTreeMap<String, FieldValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum FieldValue {
    GeoPointValue(GeoPoint),
}

impl Document {
    pub fn with_geo_point(field: &str, point: GeoPoint) -> Document {
        let mut fields = BTreeMap::new();
        fields.insert(field.to_owned(), FieldValue::GeoPointValue(point));
        Document { fields: fields }
    }
}

#[derive(Deserialize)]
struct CreatedDocument {
    name: String,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorStatus,
}

#[derive(Deserialize)]
struct ErrorStatus {
    message: String,
}

// REST client writing into the (default) database of one project
pub struct Firestore {
    http: Client,
    documents_url: String,
    credentials: Credentials,
}

impl Firestore {
    pub fn new(endpoint: &str, project_id: &str, credentials: Credentials) -> Result<Firestore, UploadError> {
        let http = Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Firestore {
            http: http,
            documents_url: format!(
                "{}/v1/projects/{}/databases/(default)/documents",
                endpoint.trim_end_matches('/'),
                project_id
            ),
            credentials: credentials,
        })
    }

    // an emulator needs no key; otherwise the key is required and may supply the project id
    pub fn from_config(config: &Config) -> Result<Firestore, UploadError> {
        if let Some(host) = &config.emulator_host {
            info!("Using the Firestore emulator at {}", host);
            let project_id = config.project_id.as_deref().ok_or(UploadError::MissingProjectId)?;
            return Firestore::new(&format!("http://{}", host), project_id, Credentials::Emulator);
        }

        let key_path = config.key_path.as_deref().ok_or(UploadError::MissingCredentials)?;
        let account = ServiceAccount::new(ServiceAccountKey::from_file(key_path)?)?;
        let project_id = config
            .project_id
            .clone()
            .or_else(|| account.project_id().map(|id| id.to_owned()))
            .ok_or(UploadError::MissingProjectId)?;

        info!("Uploading to project {}", project_id);
        Firestore::new(FIRESTORE_ENDPOINT, &project_id, Credentials::ServiceAccount(account))
    }
}

#[async_trait]
impl DocumentSink for Firestore {
    // POST without a documentId, so Firestore generates one like collection.add does
    async fn add_document(&mut self, collection: &str, document: &Document) -> Result<String, UploadError> {
        let token = self.credentials.bearer_token(&self.http).await?;
        let response = self
            .http
            .post(format!("{}/{}", self.documents_url, collection))
            .bearer_auth(token)
            .json(document)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(UploadError::Rejected {
                status: status.as_u16(),
                message: error_message(body),
            });
        }

        let created: CreatedDocument = response.json().await?;
        debug!("Created {}", created.name);
        Ok(created.name)
    }
}

// Google APIs wrap failures as {"error": {"code", "message", "status"}}
fn error_message(body: String) -> String {
    match serde_json::from_str::<ErrorResponse>(&body) {
        Ok(parsed) => parsed.error.message,
        Err(_) => body,
    }
}
