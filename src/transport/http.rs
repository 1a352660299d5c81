use super::{RawResponse, Transport, TransportError};
use crate::config::ClientConfig;
use crate::request::{FieldValue, Payload};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};

/// Multipart transport over `reqwest`
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    /// Build a client from configuration
    ///
    /// No timeout is applied unless the configuration sets one.
    pub fn new(config: &ClientConfig) -> Result<Self, TransportError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build()?;

        tracing::info!(
            "HTTP transport targeting {} (timeout: {:?})",
            if config.base_url.is_empty() { "<same origin>" } else { config.base_url.as_str() },
            config.timeout
        );

        Ok(Self::with_client(client, config.base_url.clone()))
    }

    /// Reuse an existing [`reqwest::Client`]
    pub fn with_client(client: reqwest::Client, base_url: String) -> Self {
        Self { client, base_url }
    }

    fn form(payload: &Payload) -> Result<Form, TransportError> {
        let mut form = Form::new();
        for (name, value) in &payload.fields {
            form = match value {
                FieldValue::Text(text) => form.text(name.clone(), text.clone()),
                FieldValue::File {
                    file_name,
                    mime,
                    bytes,
                } => {
                    let part = Part::bytes(bytes.clone())
                        .file_name(file_name.clone())
                        .mime_str(mime)?;
                    form.part(name.clone(), part)
                }
            };
        }
        Ok(form)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, payload: &Payload) -> Result<RawResponse, TransportError> {
        let endpoint = crate::config::endpoint(&self.base_url, payload.path);
        let url = reqwest::Url::parse(&endpoint)
            .map_err(|e| TransportError::InvalidUrl(format!("{endpoint}: {e}")))?;

        tracing::debug!("POST {} with {} fields", url, payload.fields.len());

        let response = self
            .client
            .post(url)
            .multipart(Self::form(payload)?)
            .send()
            .await?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.bytes().await?.to_vec();

        tracing::debug!(
            "Response {} ({} bytes, content type {:?})",
            status,
            body.len(),
            content_type
        );

        Ok(RawResponse {
            status,
            content_type,
            body,
        })
    }
}
