use thiserror::Error;

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("cannot open {path}: {source}")]
    OpenFile {
        path: String,
        source: std::io::Error,
    },
    #[error("cannot read input: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid csv: {0}")]
    Csv(#[from] csv::Error),
    #[error("line {line}: expected at least {expected} fields, found {found}")]
    MissingField {
        line: u64,
        expected: usize,
        found: usize,
    },
    #[error("line {line}: {column} \"{value}\" is not a valid number")]
    InvalidNumber {
        line: u64,
        column: &'static str,
        value: String,
    },
    #[error("invalid service account key: {0}")]
    InvalidKey(serde_json::Error),
    #[error("cannot sign token request: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),
    #[error("token request rejected with status {status}: {message}")]
    TokenRejected { status: u16, message: String },
    #[error("token endpoint granted an unusable lifetime of {0} seconds")]
    InvalidTokenLifetime(i64),
    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Firestore rejected the document with status {status}: {message}")]
    Rejected { status: u16, message: String },
    #[error("no credentials: pass --key or set GOOGLE_APPLICATION_CREDENTIALS")]
    MissingCredentials,
    #[error("no project id: pass --project, use a key file with project_id or set GOOGLE_CLOUD_PROJECT")]
    MissingProjectId,
    #[error("upload cancelled")]
    Cancelled,
}
