//! Layerforge CLI - build container image layers into bootstraps and blobs.

pub mod commands;
