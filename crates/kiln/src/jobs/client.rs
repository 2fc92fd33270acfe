//! TrellisClient - HTTP client for the Trellis text-to-3D service.

use async_trait::async_trait;
use kilnconf::TrellisConfig;
use reqwest::{Client, Url};
use serde::Deserialize;
use std::time::Duration;

use super::{GenerationRequest, JobService, Task};
use crate::error::{BridgeError, Result};

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    #[serde(default)]
    request_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TrellisClient {
    client: Client,
    base_url: String,
}

impl TrellisClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BridgeError::JobService(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &TrellisConfig) -> Result<Self> {
        Self::new(&config.base_url, config.request_timeout())
    }

    /// `base_url` with `segments` appended, each percent-encoded as one path segment.
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| BridgeError::JobService(format!("Invalid base URL {}: {}", self.base_url, e)))?;
        url.path_segments_mut()
            .map_err(|_| {
                BridgeError::JobService(format!("Base URL {} cannot take a path", self.base_url))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(BridgeError::JobService(format!(
            "service returned status {}: {}",
            status, body
        )))
    }
}

#[async_trait]
impl JobService for TrellisClient {
    fn base_url(&self) -> &str {
        &self.base_url
    }

    #[tracing::instrument(name = "trellis.submit", skip(self, request), fields(task.id = tracing::field::Empty))]
    async fn submit_job(&self, request: &GenerationRequest) -> Result<String> {
        request.validate()?;

        let url = self.endpoint(&["text_to_3d"])?;
        let response = self.client.post(url).json(request).send().await?;
        let submitted: SubmitResponse = Self::check(response).await?.json().await?;

        let task_id = submitted
            .request_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                BridgeError::JobService(
                    "Failed to start text-to-3D task. No task ID returned.".to_string(),
                )
            })?;

        tracing::Span::current().record("task.id", task_id.as_str());
        tracing::info!(task.id = %task_id, "Text-to-3D task submitted");
        Ok(task_id)
    }

    #[tracing::instrument(name = "trellis.get_task", skip(self))]
    async fn get_job(&self, task_id: &str) -> Result<Task> {
        let url = self.endpoint(&["task", task_id])?;
        let response = self.client.get(url).send().await?;
        let task: Task = Self::check(response).await?.json().await?;
        tracing::debug!(task.status = %task.status, "Fetched task snapshot");
        Ok(task)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::TaskStatus;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> TrellisClient {
        TrellisClient::new(&server.uri(), Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn submit_posts_generation_params() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/text_to_3d"))
            .and(body_partial_json(json!({
                "prompt": "a red teapot",
                "geometry_sample_steps": 12,
                "texture_cfg_strength": 3.5
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"request_id": "t-1"})))
            .expect(1)
            .mount(&server)
            .await;

        let task_id = client_for(&server)
            .submit_job(&GenerationRequest::new("a red teapot"))
            .await
            .unwrap();
        assert_eq!(task_id, "t-1");
    }

    #[tokio::test]
    async fn submit_without_id_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/text_to_3d"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"request_id": ""})))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .submit_job(&GenerationRequest::new("a red teapot"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("No task ID returned"));
    }

    #[tokio::test]
    async fn invalid_request_never_hits_the_wire() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let err = client_for(&server)
            .submit_job(&GenerationRequest::new(""))
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::InvalidCommand(_)));
    }

    #[tokio::test]
    async fn get_job_decodes_snapshot() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/task/t-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "request_id": "t-1",
                "status": "complete",
                "task_type": "text_to_3d",
                "request_output_dir": "/srv/output/1.2.3.4/t-1",
                "client_ip": "1.2.3.4"
            })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let task = client.get_job("t-1").await.unwrap();
        assert_eq!(task.status, TaskStatus::Complete);
        assert_eq!(
            task.output_locator(client.base_url()),
            Some(format!("{}/output/1.2.3.4/t-1/output.glb", server.uri()))
        );
    }

    #[tokio::test]
    async fn task_id_stays_one_path_segment() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/task/a%2F..%2Fx%3Fy"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "request_id": "a/../x?y",
                "status": "queued"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let task = client_for(&server).get_job("a/../x?y").await.unwrap();
        assert_eq!(task.id, "a/../x?y");
    }

    #[tokio::test]
    async fn base_url_path_prefix_is_kept() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/trellis/task/t-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "request_id": "t-1",
                "status": "processing"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client =
            TrellisClient::new(&format!("{}/trellis/", server.uri()), Duration::from_secs(5))
                .unwrap();
        assert_eq!(client.get_job("t-1").await.unwrap().status, TaskStatus::Processing);
    }

    #[tokio::test]
    async fn http_failure_carries_status_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/task/missing"))
            .respond_with(ResponseTemplate::new(404).set_body_string("no such task"))
            .mount(&server)
            .await;

        let err = client_for(&server).get_job("missing").await.unwrap_err();
        match err {
            BridgeError::JobService(message) => {
                assert!(message.contains("404"), "{}", message);
                assert!(message.contains("no such task"), "{}", message);
            }
            other => panic!("expected job service error, got {:?}", other),
        }
    }
}
