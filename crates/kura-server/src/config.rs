//! Server configuration.

use std::path::PathBuf;

use clap::Parser;

use crate::constants::{DEFAULT_BIND_ADDRESS, DEFAULT_MAX_UPLOAD_BYTES, DEFAULT_STORAGE_ROOT};

/// HTTP file storage server.
#[derive(Parser, Debug)]
#[command(name = "kura-server")]
#[command(about = "HTTP file storage over a local directory")]
pub struct Args {
    /// Directory holding the stored files (created if missing)
    #[arg(long, default_value = DEFAULT_STORAGE_ROOT)]
    pub root: PathBuf,

    /// Address to listen on
    #[arg(long, default_value = DEFAULT_BIND_ADDRESS)]
    pub addr: String,

    /// Request body limit for upload and update, in bytes
    #[arg(long, default_value_t = DEFAULT_MAX_UPLOAD_BYTES)]
    pub max_upload_bytes: usize,
}

/// Runtime configuration for [`crate::HttpServer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub root: PathBuf,
    pub bind_addr: String,
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from(DEFAULT_STORAGE_ROOT),
            bind_addr: DEFAULT_BIND_ADDRESS.to_string(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

impl ServerConfig {
    /// Config on an OS-assigned localhost port (for testing).
    pub fn ephemeral(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            bind_addr: "127.0.0.1:0".to_string(),
            ..Default::default()
        }
    }
}

impl From<Args> for ServerConfig {
    fn from(args: Args) -> Self {
        Self {
            root: args.root,
            bind_addr: args.addr,
            max_upload_bytes: args.max_upload_bytes,
        }
    }
}
