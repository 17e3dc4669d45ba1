//! Server configuration constants.
//!
//! Centralizes hardcoded values for easier configuration and documentation.

/// Default storage root, relative to the working directory.
pub const DEFAULT_STORAGE_ROOT: &str = "./storage";

/// Default listen address (localhost only).
pub const DEFAULT_BIND_ADDRESS: &str = "localhost:8080";

/// Default request body limit for upload and update (100 MiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 100 << 20;

/// Multipart field carrying file content.
pub const FILE_FIELD: &str = "file";
