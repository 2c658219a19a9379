//! IPFS HTTP API content store

use crate::error::CollaboratorError;
use crate::traits::ContentStore;
use async_trait::async_trait;
use bytes::Bytes;
use reqnet_primitives::ContentAddress;
use serde::Deserialize;
use tracing::debug;

/// Content store talking to an IPFS node's HTTP API
pub struct IpfsContentStore {
    client: reqwest::Client,
    url: String,
}

impl IpfsContentStore {
    /// Create a store for the node at `url` (e.g. `http://localhost:5001`)
    pub fn new(url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.trim_end_matches('/').to_string(),
        }
    }

    fn endpoint(&self, command: &str) -> String {
        format!("{}/api/v0/{}", self.url, command)
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, CollaboratorError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(classify_status(status.as_u16(), &body))
    }
}

/// Map a failed HTTP status to a collaborator error.
///
/// IPFS reports missing blocks with a 500 and a "not found" message, so the
/// body is checked before the status class.
pub(crate) fn classify_status(status: u16, body: &str) -> CollaboratorError {
    let message = format!("ipfs returned {}: {}", status, body.trim());
    if status == 404 || body.to_ascii_lowercase().contains("not found") {
        CollaboratorError::not_found(message)
    } else if status >= 500 || status == 408 || status == 429 {
        CollaboratorError::connection(message)
    } else {
        CollaboratorError::corrupt(message)
    }
}

#[derive(Deserialize)]
struct AddResponse {
    #[serde(rename = "Hash")]
    hash: String,
}

/// Extract the content address from an `add` response
pub(crate) fn parse_add_response(body: &[u8]) -> Result<ContentAddress, CollaboratorError> {
    let response: AddResponse = serde_json::from_slice(body)
        .map_err(|e| CollaboratorError::corrupt(format!("invalid ipfs add response: {}", e)))?;
    ContentAddress::new(response.hash).map_err(|e| CollaboratorError::corrupt(e.to_string()))
}

#[async_trait]
impl ContentStore for IpfsContentStore {
    async fn put(&self, data: Bytes) -> Result<ContentAddress, CollaboratorError> {
        let size = data.len();
        let part = reqwest::multipart::Part::bytes(data.to_vec()).file_name("content");
        let form = reqwest::multipart::Form::new().part("file", part);

        let response = self
            .client
            .post(self.endpoint("add"))
            .query(&[("pin", "true")])
            .multipart(form)
            .send()
            .await
            .map_err(|e| CollaboratorError::connection(e.to_string()))?;
        let body = Self::check(response)
            .await?
            .bytes()
            .await
            .map_err(|e| CollaboratorError::connection(e.to_string()))?;

        let address = parse_add_response(&body)?;
        debug!(content = %address, size, "Stored content on ipfs");
        Ok(address)
    }

    async fn get(&self, address: &ContentAddress) -> Result<Bytes, CollaboratorError> {
        let response = self
            .client
            .post(self.endpoint("cat"))
            .query(&[("arg", address.as_str())])
            .send()
            .await
            .map_err(|e| CollaboratorError::connection(e.to_string()))?;
        Self::check(response)
            .await?
            .bytes()
            .await
            .map_err(|e| CollaboratorError::connection(e.to_string()))
    }
}
