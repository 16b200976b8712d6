use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fs;
use tracing::debug;
use super::error::UploadError;

pub const DATASTORE_SCOPE: &str = "https://www.googleapis.com/auth/datastore";
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;
const REFRESH_MARGIN_SECS: i64 = 60;
// the emulator accepts this token as an admin caller
const EMULATOR_TOKEN: &str = "owner";

// the part of a Google service-account JSON key needed to mint access tokens
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub private_key_id: Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_owned()
}

impl ServiceAccountKey {
    pub fn from_file(path: &str) -> Result<ServiceAccountKey, UploadError> {
        let text = fs::read_to_string(path).map_err(|source| UploadError::OpenFile {
            path: path.to_owned(),
            source: source,
        })?;
        ServiceAccountKey::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<ServiceAccountKey, UploadError> {
        serde_json::from_str(text).map_err(UploadError::InvalidKey)
    }
}

#[derive(Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

#[derive(Debug, Clone)]
struct AccessToken {
    value: String,
    expires_at: DateTime<Utc>,
}

// trades signed JWT assertions for OAuth access tokens, keeping the current one until it nearly expires
pub struct ServiceAccount {
    key: ServiceAccountKey,
    signing_key: EncodingKey,
    token: Option<AccessToken>,
}

impl ServiceAccount {
    pub fn new(key: ServiceAccountKey) -> Result<ServiceAccount, UploadError> {
        let signing_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())?;
        Ok(ServiceAccount {
            key: key,
            signing_key: signing_key,
            token: None,
        })
    }

    pub fn project_id(&self) -> Option<&str> {
        self.key.project_id.as_deref()
    }

    pub async fn access_token(&mut self, http: &Client) -> Result<String, UploadError> {
        let now = Utc::now();

        if let Some(token) = &self.token {
            if token.expires_at > now + Duration::seconds(REFRESH_MARGIN_SECS) {
                return Ok(token.value.clone());
            }
        }

        debug!("Requesting access token for {}", self.key.client_email);
        let assertion = self.assertion(now)?;
        let response = http
            .post(&self.key.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(UploadError::TokenRejected {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        let granted: TokenResponse = response.json().await?;
        let expires_at = Duration::try_seconds(granted.expires_in)
            .and_then(|lifetime| now.checked_add_signed(lifetime))
            .ok_or(UploadError::InvalidTokenLifetime(granted.expires_in))?;
        let token = AccessToken {
            value: granted.access_token,
            expires_at: expires_at,
        };
        let value = token.value.clone();
        self.token = Some(token);
        Ok(value)
    }

    fn assertion(&self, now: DateTime<Utc>) -> Result<String, UploadError> {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.key.private_key_id.clone();

        let claims = Claims {
            iss: &self.key.client_email,
            scope: DATASTORE_SCOPE,
            aud: &self.key.token_uri,
            iat: now.timestamp(),
            exp: now.timestamp() + ASSERTION_LIFETIME_SECS,
        };

        Ok(encode(&header, &claims, &self.signing_key)?)
    }
}

pub enum Credentials {
    ServiceAccount(ServiceAccount),
    Emulator,
}

impl Credentials {
    pub async fn bearer_token(&mut self, http: &Client) -> Result<String, UploadError> {
        match self {
            Credentials::ServiceAccount(account) => account.access_token(http).await,
            Credentials::Emulator => Ok(EMULATOR_TOKEN.to_owned()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{decode, DecodingKey, Validation};
    use mockito::Matcher;
    use pretty_assertions::assert_eq;

    const KEY_JSON: &str = include_str!("../../testdata/service_account.json");
    const PUBLIC_KEY: &str = include_str!("../../testdata/service_account_public.pem");

    #[derive(Debug, Deserialize)]
    struct DecodedClaims {
        iss: String,
        scope: String,
        aud: String,
        iat: i64,
        exp: i64,
    }

    fn key_with_token_uri(token_uri: String) -> ServiceAccountKey {
        let mut key = ServiceAccountKey::from_json(KEY_JSON).unwrap();
        key.token_uri = token_uri;
        key
    }

    #[test]
    fn key_file_fields_are_read() {
        let key = ServiceAccountKey::from_json(KEY_JSON).unwrap();

        assert_eq!(key.client_email, "uploader@wakeup-test.iam.gserviceaccount.com");
        assert_eq!(key.project_id.as_deref(), Some("wakeup-test"));
        assert_eq!(key.private_key_id.as_deref(), Some("0123456789abcdef"));
        assert_eq!(key.token_uri, DEFAULT_TOKEN_URI);
    }

    #[test]
    fn token_uri_defaults_when_absent() {
        let key = ServiceAccountKey::from_json(r#"{"client_email":"a@b.c","private_key":"pem"}"#).unwrap();

        assert_eq!(key.token_uri, DEFAULT_TOKEN_URI);
        assert_eq!(key.project_id, None);
    }

    #[test]
    fn malformed_key_file_is_an_invalid_key() {
        let result = ServiceAccountKey::from_json(r#"{"client_email":"a@b.c"}"#);

        assert!(matches!(result, Err(UploadError::InvalidKey(_))));
    }

    #[test]
    fn missing_key_file_names_the_path() {
        match ServiceAccountKey::from_file("testdata/does_not_exist.json") {
            Err(UploadError::OpenFile { path, .. }) => assert_eq!(path, "testdata/does_not_exist.json"),
            other => panic!("unexpected result: {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn garbage_private_key_cannot_sign() {
        let key = ServiceAccountKey::from_json(r#"{"client_email":"a@b.c","private_key":"not a pem"}"#).unwrap();

        assert!(matches!(ServiceAccount::new(key), Err(UploadError::Signing(_))));
    }

    #[test]
    fn assertion_is_signed_for_the_token_endpoint() {
        let account = ServiceAccount::new(key_with_token_uri(DEFAULT_TOKEN_URI.to_owned())).unwrap();
        let now = Utc::now();

        let assertion = account.assertion(now).unwrap();

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[DEFAULT_TOKEN_URI]);
        let decoded = decode::<DecodedClaims>(
            &assertion,
            &DecodingKey::from_rsa_pem(PUBLIC_KEY.as_bytes()).unwrap(),
            &validation,
        )
        .unwrap();

        assert_eq!(decoded.header.kid.as_deref(), Some("0123456789abcdef"));
        assert_eq!(decoded.claims.iss, "uploader@wakeup-test.iam.gserviceaccount.com");
        assert_eq!(decoded.claims.scope, DATASTORE_SCOPE);
        assert_eq!(decoded.claims.aud, DEFAULT_TOKEN_URI);
        assert_eq!(decoded.claims.iat, now.timestamp());
        assert_eq!(decoded.claims.exp - decoded.claims.iat, ASSERTION_LIFETIME_SECS);
    }

    #[tokio::test]
    async fn access_token_is_fetched_once_and_cached() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/token")
            .match_body(Matcher::UrlEncoded("grant_type".into(), JWT_BEARER_GRANT.into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"access_token":"ya29.test","expires_in":3599,"token_type":"Bearer"}"#)
            .expect(1)
            .create_async()
            .await;

        let mut account = ServiceAccount::new(key_with_token_uri(format!("{}/token", server.url()))).unwrap();
        let http = Client::new();

        assert_eq!(account.access_token(&http).await.unwrap(), "ya29.test");
        assert_eq!(account.access_token(&http).await.unwrap(), "ya29.test");

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn nearly_expired_token_is_refreshed() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/token")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"access_token":"ya29.short","expires_in":30}"#)
            .expect(2)
            .create_async()
            .await;

        let mut account = ServiceAccount::new(key_with_token_uri(format!("{}/token", server.url()))).unwrap();
        let http = Client::new();

        account.access_token(&http).await.unwrap();
        account.access_token(&http).await.unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn rejected_token_request_is_an_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/token")
            .with_status(400)
            .with_body(r#"{"error":"invalid_grant"}"#)
            .create_async()
            .await;

        let mut account = ServiceAccount::new(key_with_token_uri(format!("{}/token", server.url()))).unwrap();

        match account.access_token(&Client::new()).await {
            Err(UploadError::TokenRejected { status, message }) => {
                assert_eq!(status, 400);
                assert!(message.contains("invalid_grant"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn emulator_uses_the_owner_token() {
        let mut credentials = Credentials::Emulator;

        assert_eq!(credentials.bearer_token(&Client::new()).await.unwrap(), "owner");
    }

    #[tokio::test]
    async fn out_of_range_token_lifetime_is_an_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/token")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"access_token":"ya29.forever","expires_in":9223372036854775807}"#)
            .create_async()
            .await;

        let mut account = ServiceAccount::new(key_with_token_uri(format!("{}/token", server.url()))).unwrap();

        match account.access_token(&Client::new()).await {
            Err(UploadError::InvalidTokenLifetime(seconds)) => assert_eq!(seconds, i64::MAX),
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(account.token.is_none());
    }
}
