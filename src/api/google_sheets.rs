use async_trait::async_trait;
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::header::AUTHORIZATION;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::api::order_sink::{OrderSink, SinkError};
use crate::config::app_config::SheetsConfig;
use crate::models::order_models::{as_text, OrderRecord};

const TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const SHEETS_API: &str = "https://sheets.googleapis.com/v4/spreadsheets";
const SPREADSHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

#[derive(Debug, Serialize)]
struct ServiceAccountClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Appends one row per order to a Google Sheet as a service account.
pub struct SheetsAppender {
    client: Client,
    config: SheetsConfig,
    key: EncodingKey,
}

impl SheetsAppender {
    pub fn new(config: SheetsConfig) -> Result<Self, SinkError> {
        let key = EncodingKey::from_rsa_pem(config.private_key.as_bytes())?;
        Ok(Self {
            client: Client::new(),
            config,
            key,
        })
    }

    fn sign_assertion(&self) -> Result<String, SinkError> {
        let now = Utc::now();
        let claims = ServiceAccountClaims {
            iss: &self.config.client_email,
            scope: SPREADSHEETS_SCOPE,
            aud: TOKEN_URI,
            iat: now.timestamp(),
            exp: (now + Duration::hours(1)).timestamp(),
        };
        Ok(encode(&Header::new(Algorithm::RS256), &claims, &self.key)?)
    }

    async fn fetch_access_token(&self) -> Result<String, SinkError> {
        let assertion = self.sign_assertion()?;
        let response = self
            .client
            .post(TOKEN_URI)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SinkError::Api {
                service: "google oauth",
                status: response.status(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        let token: TokenResponse = response.json().await?;
        Ok(token.access_token)
    }
}

pub fn append_url(sheet_id: &str, range: &str) -> String {
    format!(
        "{}/{}/values/{}:append?valueInputOption=USER_ENTERED&insertDataOption=INSERT_ROWS",
        SHEETS_API,
        urlencoding::encode(sheet_id),
        urlencoding::encode(range)
    )
}

pub fn append_body(order: &OrderRecord) -> Value {
    json!({
        "majorDimension": "ROWS",
        "values": [order.ledger_row()],
    })
}

#[async_trait]
impl OrderSink for SheetsAppender {
    async fn deliver(&self, order: &OrderRecord) -> Result<(), SinkError> {
        let access_token = self.fetch_access_token().await?;

        let response = self
            .client
            .post(append_url(&self.config.sheet_id, &self.config.range))
            .header(AUTHORIZATION, format!("Bearer {}", access_token))
            .json(&append_body(order))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SinkError::Api {
                service: "google sheets",
                status: response.status(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        tracing::info!("Sheet updated for {}", as_text(&order.submission.name));
        Ok(())
    }
}
