pub mod api;
pub mod errors;
pub mod extractor;
pub mod harvester;
pub mod models;
pub mod normalizer;
pub mod orchestrator;
pub mod store;
pub mod strategy;
