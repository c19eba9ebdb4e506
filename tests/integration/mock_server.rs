//! Mock HTTP generation endpoint

use mockito::{Mock, Server, ServerGuard};
use workout_planner::config::BackendConfig;
use workout_planner::generation::HttpGenerationBackend;

pub const GENERATE_PATH: &str = "/v1/generate";

/// Test fixture that manages a mock server
pub struct MockServerFixture {
    pub server: ServerGuard,
    pub base_url: String,
}

impl MockServerFixture {
    pub async fn new() -> Self {
        let server = Server::new_async().await;
        let base_url = server.url();
        Self { server, base_url }
    }

    pub fn backend_config(&self) -> BackendConfig {
        BackendConfig::default()
            .with_url(format!("{}{}", self.base_url, GENERATE_PATH))
            .with_api_key("test-key")
    }

    pub fn backend(&self) -> HttpGenerationBackend {
        HttpGenerationBackend::new(&self.backend_config()).expect("backend builds")
    }

    /// Create a mock for a JSON response, expected exactly once
    pub async fn mock_json_response(&mut self, status: usize, body: &str) -> Mock {
        self.mock_json_response_times(status, body, 1).await
    }

    /// Create a mock for a JSON response, expected `hits` times
    pub async fn mock_json_response_times(&mut self, status: usize, body: &str, hits: usize) -> Mock {
        self.server
            .mock("POST", GENERATE_PATH)
            .match_header("authorization", "Bearer test-key")
            .with_status(status)
            .with_header("content-type", "application/json")
            .with_body(body)
            .expect(hits)
            .create_async()
            .await
    }
}
