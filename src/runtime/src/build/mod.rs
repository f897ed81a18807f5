//! Layered bootstrap and blob building.
//!
//! Turns the layers of one container image, bottom-to-top, into a chain of
//! bootstraps plus content-addressed blobs:
//!
//! ```text
//! <target>/
//! ├── bootstraps/
//! │   ├── 0-bootstrap               (base layer, no parent)
//! │   ├── 0-bootstrap-output.json   (builder report)
//! │   ├── 1-bootstrap               (parent: 0-bootstrap)
//! │   └── ...
//! └── blobs/
//!     ├── <sha256 hex>              (published blob)
//!     └── ...
//! ```

pub mod builder;
pub mod report;
pub mod resolver;
pub mod workflow;

pub use builder::{BlobBuilder, BuilderOption, NydusImageBuilder};
pub use report::{report_path, BuildReport};
pub use resolver::BlobResolution;
pub use workflow::Workflow;
