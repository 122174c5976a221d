//! HTTP implementation of the font job backend.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{
    multipart::{Form, Part},
    Client, Response,
};
use serde::de::DeserializeOwned;
use shared::{
    domain::TaskId,
    error::ErrorBody,
    protocol::{
        CreateFontRequest, CreateFontResponse, CreateTaskResponse, UploadAck,
        CREATE_FONT_ENDPOINT, CREATE_TASK_ENDPOINT, DOWNLOAD_ENDPOINT, UPLOAD_CHAR_ENDPOINT,
        UPLOAD_FIELD_CHAR, UPLOAD_FIELD_FILE, UPLOAD_FIELD_TASK_ID,
    },
};
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::{types::ImageBlob, JobApi};

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("backend rejected the request with status {status}")]
    Rejected { status: u16, message: Option<String> },
    #[error("request timed out")]
    Timeout,
    #[error("malformed backend response: {0}")]
    Malformed(String),
    #[error("network failure: {0}")]
    Network(String),
    #[error("invalid backend url: {0}")]
    InvalidUrl(String),
}

impl TransportError {
    /// The `error` message supplied by the backend, if it sent one.
    pub fn backend_message(&self) -> Option<&str> {
        match self {
            TransportError::Rejected {
                message: Some(message),
                ..
            } => Some(message),
            _ => None,
        }
    }

    /// Text suitable for a user-facing notification.
    pub fn user_message(&self) -> String {
        self.backend_message()
            .map(str::to_string)
            .unwrap_or_else(|| self.to_string())
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout
        } else if err.is_decode() {
            TransportError::Malformed(err.to_string())
        } else {
            TransportError::Network(err.to_string())
        }
    }
}

pub struct HttpJobApi {
    http: Client,
    base_url: Url,
}

impl HttpJobApi {
    pub fn new(base_url: &str) -> Result<Self, TransportError> {
        Self::with_timeout(base_url, DEFAULT_REQUEST_TIMEOUT)
    }

    /// Every request is bounded by `timeout`; expiry surfaces as [`TransportError::Timeout`].
    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self, TransportError> {
        let base_url =
            Url::parse(base_url).map_err(|e| TransportError::InvalidUrl(format!("{base_url}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(TransportError::InvalidUrl(base_url.to_string()));
        }
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, TransportError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| TransportError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn checked(response: Response) -> Result<Response, TransportError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.bytes().await.unwrap_or_default();
        Err(TransportError::Rejected {
            status: status.as_u16(),
            message: ErrorBody::message_from_body(&body),
        })
    }

    async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, TransportError> {
        let body = Self::checked(response).await?.bytes().await?;
        serde_json::from_slice(&body).map_err(|e| TransportError::Malformed(e.to_string()))
    }
}

#[async_trait]
impl JobApi for HttpJobApi {
    async fn create_task(&self) -> Result<TaskId, TransportError> {
        let response = self
            .http
            .post(self.endpoint(&[CREATE_TASK_ENDPOINT])?)
            .send()
            .await?;
        let body: CreateTaskResponse = Self::read_json(response).await?;
        debug!(task_id = %body.task_id, "transport: task created");
        Ok(body.task_id)
    }

    async fn upload_character(
        &self,
        task_id: &TaskId,
        character: char,
        image: &ImageBlob,
    ) -> Result<(), TransportError> {
        let file = Part::bytes(image.bytes.clone())
            .file_name(image.file_name.clone())
            .mime_str(&image.mime_type())?;
        let form = Form::new()
            .text(UPLOAD_FIELD_CHAR, character.to_string())
            .text(UPLOAD_FIELD_TASK_ID, task_id.to_string())
            .part(UPLOAD_FIELD_FILE, file);

        let response = self
            .http
            .post(self.endpoint(&[UPLOAD_CHAR_ENDPOINT])?)
            .multipart(form)
            .send()
            .await?;
        let body = Self::checked(response).await?.bytes().await?;
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(());
        }
        serde_json::from_slice::<UploadAck>(&body)
            .map(|_| ())
            .map_err(|e| TransportError::Malformed(e.to_string()))
    }

    async fn create_font(
        &self,
        request: &CreateFontRequest,
    ) -> Result<CreateFontResponse, TransportError> {
        let response = self
            .http
            .post(self.endpoint(&[CREATE_FONT_ENDPOINT])?)
            .json(request)
            .send()
            .await?;
        Self::read_json(response).await
    }

    async fn download_artifact(&self, file_name: &str) -> Result<Vec<u8>, TransportError> {
        let bytes = Self::checked(
            self.http
                .get(self.endpoint(&[DOWNLOAD_ENDPOINT, file_name])?)
                .send()
                .await?,
        )
        .await?
        .bytes()
        .await?;
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
#[path = "tests/transport_tests.rs"]
mod tests;
