use async_trait::async_trait;
use exam_core::model::{AttemptId, ExamResult, ServerAttempt, SubjectId, TemplateId};
use reqwest::{Client, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use url::Url;

use super::ExamAttemptApi;
use crate::error::ApiError;

/// `ExamAttemptApi` over the platform's JSON REST endpoints.
#[derive(Clone)]
pub struct HttpExamApi {
    client: Client,
    base_url: Url,
    bearer_token: Option<String>,
}

impl HttpExamApi {
    /// `base_url` should end with a slash; see `config::parse_base_url`.
    #[must_use]
    pub fn new(base_url: Url) -> Self {
        Self {
            client: Client::new(),
            base_url,
            bearer_token: None,
        }
    }

    #[must_use]
    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    #[must_use]
    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        self.base_url
            .join(path)
            .map_err(|err| ApiError::Unavailable(err.to_string()))
    }

    async fn post<B: Serialize + Sync, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<Option<T>, ApiError> {
        let mut request = self.client.post(self.endpoint(path)?).json(body);
        if let Some(token) = &self.bearer_token {
            request = request.bearer_auth(token);
        }
        decode(request.send().await?).await
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>, ApiError> {
        let mut request = self.client.get(self.endpoint(path)?);
        if let Some(token) = &self.bearer_token {
            request = request.bearer_auth(token);
        }
        decode(request.send().await?).await
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StartSingleRequest<'a> {
    template_id: &'a TemplateId,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StartComboRequest<'a> {
    template_ids: &'a [TemplateId],
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StartRandomComboRequest<'a> {
    subject_ids: &'a [SubjectId],
}

#[async_trait]
impl ExamAttemptApi for HttpExamApi {
    async fn start_single(
        &self,
        template: &TemplateId,
    ) -> Result<Option<ServerAttempt>, ApiError> {
        self.post(
            "exam-attempts/start",
            &StartSingleRequest {
                template_id: template,
            },
        )
        .await
    }

    async fn start_combo(
        &self,
        templates: &[TemplateId],
    ) -> Result<Option<ServerAttempt>, ApiError> {
        self.post(
            "exam-attempts/combo/start",
            &StartComboRequest {
                template_ids: templates,
            },
        )
        .await
    }

    async fn start_random_combo(
        &self,
        subjects: &[SubjectId],
    ) -> Result<Option<ServerAttempt>, ApiError> {
        self.post(
            "exam-attempts/random-combo/start",
            &StartRandomComboRequest {
                subject_ids: subjects,
            },
        )
        .await
    }

    async fn fetch_result(&self, attempt: &AttemptId) -> Result<Option<ExamResult>, ApiError> {
        self.get(&format!("exam-attempts/{attempt}/result")).await
    }
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<Option<T>, ApiError> {
    match response.status() {
        StatusCode::NO_CONTENT | StatusCode::NOT_FOUND => return Ok(None),
        status if !status.is_success() => return Err(ApiError::HttpStatus(status)),
        _ => {}
    }

    let body = response.text().await?;
    decode_body(&body)
}

/// Empty bodies and `null` are empty responses; a `{ "data": ... }`
/// envelope is unwrapped.
fn decode_body<T: DeserializeOwned>(body: &str) -> Result<Option<T>, ApiError> {
    if body.trim().is_empty() {
        return Ok(None);
    }
    let value: Value =
        serde_json::from_str(body).map_err(|err| ApiError::Decode(err.to_string()))?;
    let payload = match value {
        Value::Object(mut map) if map.len() == 1 && map.contains_key("data") => {
            map.remove("data").unwrap_or(Value::Null)
        }
        other => other,
    };
    if payload.is_null() {
        return Ok(None);
    }
    serde_json::from_value(payload)
        .map(Some)
        .map_err(|err| ApiError::Decode(err.to_string()))
}
