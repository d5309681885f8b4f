// src/services/remote_renderer.rs

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

use crate::{
    errors::{PayrollError, PayrollResult},
    models::Bulletin,
    services::render::{DocumentRenderer, check_renderable},
};

/// Renders through an external document service that accepts the bulletin
/// as JSON and answers with a base64 PDF.
#[derive(Clone)]
pub struct RemoteRenderer {
    client: Client,
    base_url: String,
    template_version: String,
}

#[derive(Debug, Serialize)]
struct RenderRequest<'a> {
    #[serde(rename = "templateVersion")]
    template_version: &'a str,
    #[serde(rename = "documentName")]
    document_name: String,
    bulletin: &'a Bulletin,
}

#[derive(Debug, Deserialize)]
struct RenderResponse {
    #[serde(rename = "requestSuccessful")]
    request_successful: bool,
    #[serde(rename = "responseMessage")]
    response_message: String,
    #[serde(rename = "responseBody")]
    response_body: Option<RenderBody>,
}

#[derive(Debug, Deserialize)]
struct RenderBody {
    content: String,
}

impl RemoteRenderer {
    pub fn new(
        base_url: impl Into<String>,
        template_version: impl Into<String>,
        timeout: Duration,
    ) -> PayrollResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PayrollError::InvalidInput(format!("renderer client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            template_version: template_version.into(),
        })
    }
}

fn render_error(bulletin_id: Uuid, reason: impl ToString) -> PayrollError {
    PayrollError::RenderError {
        bulletin_id,
        reason: reason.to_string(),
    }
}

#[async_trait]
impl DocumentRenderer for RemoteRenderer {
    fn template_version(&self) -> &str {
        &self.template_version
    }

    async fn render(&self, bulletin: &Bulletin) -> PayrollResult<Vec<u8>> {
        check_renderable(bulletin)?;
        let url = format!("{}/api/v1/render/bulletin", self.base_url);

        let payload = RenderRequest {
            template_version: &self.template_version,
            document_name: bulletin.document_name(),
            bulletin,
        };

        let resp = self
            .client
            .post(&url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| render_error(bulletin.id, e))?;

        let result: RenderResponse = resp
            .json()
            .await
            .map_err(|e| render_error(bulletin.id, e))?;

        if !result.request_successful {
            return Err(render_error(bulletin.id, result.response_message));
        }

        let body = result
            .response_body
            .ok_or_else(|| render_error(bulletin.id, "no document in response"))?;

        general_purpose::STANDARD
            .decode(body.content)
            .map_err(|e| render_error(bulletin.id, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::fixtures;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn decodes_document_from_service() {
        let server = MockServer::start().await;
        let bulletin = fixtures::bulletin(&[]);
        Mock::given(method("POST"))
            .and(path("/api/v1/render/bulletin"))
            .and(body_partial_json(json!({
                "templateVersion": "remote/3",
                "documentName": bulletin.document_name(),
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "requestSuccessful": true,
                "responseMessage": "ok",
                "responseBody": { "content": general_purpose::STANDARD.encode(b"%PDF-1.7 remote") },
            })))
            .expect(1)
            .mount(&server)
            .await;

        let renderer = RemoteRenderer::new(server.uri(), "remote/3", Duration::from_secs(5)).unwrap();
        let bytes = renderer.render(&bulletin).await.unwrap();
        assert_eq!(bytes, b"%PDF-1.7 remote");
    }

    #[tokio::test]
    async fn service_refusal_is_a_render_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "requestSuccessful": false,
                "responseMessage": "template not found",
                "responseBody": null,
            })))
            .mount(&server)
            .await;

        let renderer = RemoteRenderer::new(server.uri(), "remote/3", Duration::from_secs(5)).unwrap();
        let err = renderer.render(&fixtures::bulletin(&[])).await.unwrap_err();
        match err {
            PayrollError::RenderError { reason, .. } => assert_eq!(reason, "template not found"),
            other => panic!("unexpected {other:?}"),
        }
    }
}
