pub mod dashboard;
pub mod document_store;
pub mod extraction_service;
pub mod lifecycle;

pub use dashboard::{partition, DashboardView};
pub use document_store::DocumentStore;
pub use extraction_service::{parse_field_set, ExtractionClient, LlmExtractionClient};
