use async_trait::async_trait;
use synthid_types::{
    AttackRequest, DashboardStats, Detection, DetectionId, DetectionQuery, DetectionSummary, Generation,
    GenerationId, GenerationQuery, GenerationRequest, GenerationSummary, Page,
};

pub mod error;
pub use error::ApiError;

pub mod http;
pub use http::{ApiClient, RequestOptions};

pub mod http_backend;
pub use http_backend::HttpBackend;

pub mod memory;
pub use memory::{InMemoryBackend, RecordedCall};

pub mod paths;

/// The testbed service as seen by the client. Everything the views do goes through this trait.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn list_generations(&self, query: &GenerationQuery) -> Result<Page<GenerationSummary>, ApiError>;

    async fn get_generation(&self, id: GenerationId) -> Result<Generation, ApiError>;

    async fn create_generation(&self, req: &GenerationRequest) -> Result<Generation, ApiError>;

    async fn delete_generation(&self, id: GenerationId) -> Result<(), ApiError>;

    /// Attack a generation's output; the backend stores the result as a derived generation.
    async fn attack_generation(&self, id: GenerationId, req: &AttackRequest) -> Result<Generation, ApiError>;

    async fn detect_generation(&self, id: GenerationId) -> Result<Detection, ApiError>;

    async fn list_detections(&self, query: &DetectionQuery) -> Result<Page<DetectionSummary>, ApiError>;

    async fn get_detection(&self, id: DetectionId) -> Result<Detection, ApiError>;

    async fn dashboard_stats(&self) -> Result<DashboardStats, ApiError>;
}
