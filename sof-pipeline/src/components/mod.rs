pub mod copier;
pub mod dai_endpoint;
pub mod host_endpoint;
pub mod mixer;
pub mod passthrough;
pub mod volume;
