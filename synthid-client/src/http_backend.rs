use async_trait::async_trait;
use serde_json::json;
use synthid_types::{
    AttackRequest, DashboardStats, Detection, DetectionId, DetectionQuery, DetectionSummary, Generation,
    GenerationId, GenerationQuery, GenerationRequest, GenerationSummary, Page,
};

use crate::{paths, ApiClient, ApiError, Backend, RequestOptions};

/// `Backend` over the real REST service.
#[derive(Clone, Debug)]
pub struct HttpBackend {
    api: ApiClient,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            api: ApiClient::new(base_url),
        }
    }

    pub fn from_client(api: ApiClient) -> Self {
        Self { api }
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn list_generations(&self, query: &GenerationQuery) -> Result<Page<GenerationSummary>, ApiError> {
        self.api
            .request(paths::GENERATIONS, RequestOptions::get().query(query.to_pairs()))
            .await
    }

    async fn get_generation(&self, id: GenerationId) -> Result<Generation, ApiError> {
        self.api.request(&paths::generation(id), RequestOptions::get()).await
    }

    async fn create_generation(&self, req: &GenerationRequest) -> Result<Generation, ApiError> {
        req.validate()?;
        self.api
            .request(paths::GENERATIONS, RequestOptions::post(req)?)
            .await
    }

    async fn delete_generation(&self, id: GenerationId) -> Result<(), ApiError> {
        self.api.send(&paths::generation(id), RequestOptions::delete()).await?;
        Ok(())
    }

    async fn attack_generation(&self, id: GenerationId, req: &AttackRequest) -> Result<Generation, ApiError> {
        req.validate()?;
        self.api
            .request(&paths::attacks(id), RequestOptions::post(req)?)
            .await
    }

    async fn detect_generation(&self, id: GenerationId) -> Result<Detection, ApiError> {
        self.api
            .request(&paths::detections_for(id), RequestOptions::post(&json!({}))?)
            .await
    }

    async fn list_detections(&self, query: &DetectionQuery) -> Result<Page<DetectionSummary>, ApiError> {
        self.api
            .request(paths::DETECTIONS, RequestOptions::get().query(query.to_pairs()))
            .await
    }

    async fn get_detection(&self, id: DetectionId) -> Result<Detection, ApiError> {
        self.api.request(&paths::detection(id), RequestOptions::get()).await
    }

    async fn dashboard_stats(&self) -> Result<DashboardStats, ApiError> {
        self.api.request(paths::DASHBOARD_STATS, RequestOptions::get()).await
    }
}
