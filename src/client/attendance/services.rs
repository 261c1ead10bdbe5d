use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::AttendanceApi;
use super::models::{ApiErrorBody, AttendanceAck, AttendanceRecord, ValidateQrRequest, ValidateQrResponse};
use crate::error::ApiError;

pub struct HttpAttendanceApi {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpAttendanceApi {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }

    fn headers(&self) -> Result<HeaderMap, ApiError> {
        let mut headers = HeaderMap::new();
        if !self.api_key.is_empty() {
            headers.insert("x-api-key", HeaderValue::from_str(&self.api_key)?);
        }
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }

    async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        debug!("POST {}", url);

        let res = self
            .client
            .post(&url)
            .headers(self.headers()?)
            .json(body)
            .send()
            .await?;

        let status = res.status();
        if status.is_success() {
            Ok(res.json::<T>().await?)
        } else {
            Err(rejection(status, res).await)
        }
    }
}

async fn rejection(status: StatusCode, res: Response) -> ApiError {
    let text = res.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ApiErrorBody>(&text)
        .ok()
        .and_then(ApiErrorBody::into_message)
        .unwrap_or_else(|| {
            if text.trim().is_empty() {
                status.canonical_reason().unwrap_or("unknown error").to_string()
            } else {
                text
            }
        });
    warn!("server answered {}: {}", status, message);
    ApiError::Rejected { status, message }
}

#[async_trait]
impl AttendanceApi for HttpAttendanceApi {
    async fn validate_qr(&self, request: &ValidateQrRequest) -> Result<ValidateQrResponse, ApiError> {
        self.post("/api/qr/validate", request).await
    }

    async fn create_attendance(&self, record: &AttendanceRecord) -> Result<AttendanceAck, ApiError> {
        self.post("/api/attendance", record).await
    }
}
