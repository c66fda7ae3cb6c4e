//! Model backend served over HTTP by a separate inference process.
//!
//! Процесс с моделью живёт отдельно; здесь только JSON-клиент к нему.

use async_trait::async_trait;
use log::debug;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::config::{BackendConfig, GenerationParams};
use crate::errors::BackendError;
use crate::models::{AudioClip, Conditioning, ConditioningParams};
use crate::services::tts::backend::{ModelBackend, Transcriber};

#[derive(Serialize)]
struct ConditioningRequest<'a> {
    samples: &'a [f32],
    sample_rate: u32,
    transcript: &'a str,
    target_rms: f32,
}

#[derive(Serialize)]
struct InferRequest<'a> {
    text: &'a str,
    conditioning: &'a Conditioning,
    params: &'a GenerationParams,
}

#[derive(Deserialize)]
struct InferResponse {
    samples: Vec<f32>,
}

#[derive(Serialize)]
struct TranscribeRequest<'a> {
    samples: &'a [f32],
    sample_rate: u32,
}

#[derive(Deserialize)]
struct TranscribeResponse {
    text: String,
}

pub struct HttpModelBackend {
    client: Client,
    base_url: String,
    sample_rate: u32,
}

impl HttpModelBackend {
    pub fn new(config: &BackendConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.url.trim_end_matches('/').to_string(),
            sample_rate: config.sample_rate,
        }
    }

    async fn post<B: Serialize + ?Sized, R: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<R, BackendError> {
        let url = format!("{}/{}", self.base_url, path);
        debug!("POST {}", url);

        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| BackendError::Failed(format!("request to {} failed: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response
                .text()
                .await
                .unwrap_or_else(|e| format!("failed to read error response: {}", e));
            // 422 сервер модели отдаёт, когда не смог прочитать референс
            return Err(if status == StatusCode::UNPROCESSABLE_ENTITY {
                BackendError::Decode(text)
            } else {
                BackendError::Failed(format!("status {}: {}", status, text))
            });
        }

        response
            .json::<R>()
            .await
            .map_err(|e| BackendError::Failed(format!("invalid response from {}: {}", url, e)))
    }
}

#[async_trait]
impl ModelBackend for HttpModelBackend {
    async fn infer(
        &self,
        text: &str,
        conditioning: &Conditioning,
        params: &GenerationParams,
    ) -> Result<Vec<f32>, BackendError> {
        let request = InferRequest { text, conditioning, params };
        let response: InferResponse = self.post("infer", &request).await?;
        Ok(response.samples)
    }

    async fn get_conditioning(
        &self,
        clip: &AudioClip,
        params: &ConditioningParams,
    ) -> Result<Conditioning, BackendError> {
        let request = ConditioningRequest {
            samples: &clip.samples,
            sample_rate: clip.sample_rate,
            transcript: &params.transcript,
            target_rms: params.target_rms,
        };
        self.post("conditioning", &request).await
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

#[async_trait]
impl Transcriber for HttpModelBackend {
    async fn transcribe(&self, clip: &AudioClip) -> Result<String, BackendError> {
        let request = TranscribeRequest {
            samples: &clip.samples,
            sample_rate: clip.sample_rate,
        };
        let response: TranscribeResponse = self.post("transcribe", &request).await?;
        Ok(response.text)
    }
}
