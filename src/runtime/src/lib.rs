//! Layerforge Runtime - layered image build implementation.
//!
//! Drives an external `nydus-image` compatible builder once per image layer,
//! chains each layer's bootstrap onto its parent and publishes blobs under
//! their content digest.

pub mod build;

// Re-export common types
pub use build::{
    BlobBuilder, BlobResolution, BuildReport, BuilderOption, NydusImageBuilder, Workflow,
};
