//! CLI arguments and server configuration defaults.

use clap::Parser;
use shadow_rs::formatcp;

use crate::build;

const VERSION_INFO: &str = formatcp!(
    r#"{}\ncommit_hash: {}\nbuild_time: {}\nbuild_env: {},{}"#,
    build::PKG_VERSION,
    build::SHORT_COMMIT,
    build::BUILD_TIME,
    build::RUST_VERSION,
    build::RUST_CHANNEL
);

pub const UPLOAD_TEMP_DIR: &str = ".upload_temp";
pub const DEFAULT_STORAGE_DIR: &str = "files";
pub const DEFAULT_TEMPLATE: &str = "view.html";
pub const DEFAULT_PORT: u16 = 9000;
pub const DEFAULT_UPLOAD_MAX_SIZE: u64 = 0;
pub const SHUTDOWN_GRACE_SECS: u64 = 10;

/// CLI arguments and environment configuration for the server.
#[derive(Parser, Debug)]
#[command(name = "file-exchange", version = VERSION_INFO, about = "HTTP file exchange server")]
pub struct Args {
    #[arg(
        short = 's',
        long,
        env = "FX_STORAGE_DIR",
        default_value = DEFAULT_STORAGE_DIR,
        help = "Storage directory for uploaded files"
    )]
    pub storage_dir: String,
    #[arg(
        short = 't',
        long,
        env = "FX_TEMPLATE",
        default_value = DEFAULT_TEMPLATE,
        help = "HTML template served on the index page"
    )]
    pub template: String,
    #[arg(
        short = 'b',
        long,
        env = "FX_BIND",
        default_value = "0.0.0.0",
        help = "Bind address"
    )]
    pub host: String,
    #[arg(
        short = 'p',
        long,
        env = "FX_PORT",
        default_value_t = DEFAULT_PORT,
        help = "HTTP port"
    )]
    pub port: u16,
    #[arg(
        long,
        env = "FX_UPLOAD_MAX_SIZE",
        default_value_t = DEFAULT_UPLOAD_MAX_SIZE,
        help = "Max upload request size in bytes (0 to disable)"
    )]
    pub upload_max_size: u64,
    #[arg(long, env = "FX_CORS_ORIGINS", help = "Comma separated CORS origins")]
    pub cors_origins: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_classic_layout() {
        let args = Args::parse_from(["file-exchange"]);
        assert_eq!(args.storage_dir, "files");
        assert_eq!(args.template, "view.html");
        assert_eq!(args.port, 9000);
        assert_eq!(args.upload_max_size, 0);
        assert!(args.cors_origins.is_none());
    }
}
