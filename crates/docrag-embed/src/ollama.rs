//! Blocking client for an Ollama-compatible model server.
//!
//! - `POST /api/embeddings` `{model, prompt}` -> `{embedding}`
//! - `POST /api/chat` `{model, messages, stream: false}` -> `{message: {content}}`
//! - `GET /api/tags` -> `{models: [{name}]}`

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use docrag_core::config::ProviderSettings;
use docrag_core::error::{Error, Result};
use docrag_core::traits::{ChatProvider, EmbedProvider};
use docrag_core::types::ChatMessage;

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f32>,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    content: String,
}

#[derive(Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelTag>,
}

#[derive(Deserialize)]
struct ModelTag {
    name: String,
}

pub struct OllamaClient {
    base_url: String,
    http: reqwest::blocking::Client,
}

impl OllamaClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("docrag/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Provider(format!("building http client: {e}")))?;
        Ok(Self { base_url: base_url.trim_end_matches('/').to_string(), http })
    }

    pub fn from_settings(settings: &ProviderSettings) -> Result<Self> {
        Self::new(&settings.base_url, Duration::from_secs(settings.timeout_secs))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Names of the models installed on the server.
    pub fn list_models(&self) -> Result<Vec<String>> {
        let url = format!("{}/api/tags", self.base_url);
        let response = self.http.get(&url).send().map_err(|e| Error::Provider(format!("{url}: {e}")))?;
        let tags: TagsResponse = decode(&url, response)?;
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }

    fn post_json<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        let url = format!("{}{path}", self.base_url);
        debug!(%url, "provider request");
        let response = self
            .http
            .post(&url)
            .json(body)
            .send()
            .map_err(|e| Error::Provider(format!("{url}: {e}")))?;
        decode(&url, response)
    }
}

fn decode<T: DeserializeOwned>(url: &str, response: reqwest::blocking::Response) -> Result<T> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().unwrap_or_default();
        return Err(Error::ProviderStatus { status: status.as_u16(), body });
    }
    response.json::<T>().map_err(|e| Error::Decode(format!("{url}: {e}")))
}

impl EmbedProvider for OllamaClient {
    fn embed(&self, model: &str, prompt: &str) -> Result<Vec<f32>> {
        let response: EmbeddingResponse = self.post_json("/api/embeddings", &EmbeddingRequest { model, prompt })?;
        if response.embedding.is_empty() {
            return Err(Error::Decode(format!("model '{model}' returned an empty embedding")));
        }
        Ok(response.embedding)
    }
}

impl ChatProvider for OllamaClient {
    fn chat(&self, model: &str, messages: &[ChatMessage]) -> Result<String> {
        let response: ChatResponse = self.post_json("/api/chat", &ChatRequest { model, messages, stream: false })?;
        Ok(response.message.content)
    }
}
