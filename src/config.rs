//! Configuration for Darshan
//!
//! CLI arguments and environment variable handling using clap.

use clap::Parser;
use std::net::SocketAddr;
use uuid::Uuid;

/// Darshan - content management backend for a regional tourism portal
#[derive(Parser, Debug, Clone)]
#[command(name = "darshan")]
#[command(about = "Admin and content API for the tourism portal")]
pub struct Args {
    /// Unique node identifier for this instance
    #[arg(long, env = "NODE_ID", default_value_t = Uuid::new_v4())]
    pub node_id: Uuid,

    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:8080")]
    pub listen: SocketAddr,

    /// Enable development mode (insecure JWT secret, Mongo optional)
    #[arg(long, env = "DEV_MODE", default_value = "false")]
    pub dev_mode: bool,

    /// MongoDB connection URI
    #[arg(long, env = "MONGODB_URI", default_value = "mongodb://localhost:27017")]
    pub mongodb_uri: String,

    /// MongoDB database name
    #[arg(long, env = "MONGODB_DB", default_value = "darshan")]
    pub mongodb_db: String,

    /// JWT secret for token verification (required in production)
    #[arg(long, env = "JWT_SECRET")]
    pub jwt_secret: Option<String>,

    /// Asset host configuration
    #[command(flatten)]
    pub assets: AssetHostArgs,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

/// Asset host (Cloudinary-compatible API) connection configuration
#[derive(Parser, Debug, Clone)]
pub struct AssetHostArgs {
    /// Asset host API base URL
    #[arg(long, env = "ASSET_API_BASE", default_value = "https://api.cloudinary.com")]
    pub asset_api_base: String,

    /// Delivery hostname used to recognize managed asset URLs
    #[arg(long, env = "ASSET_DELIVERY_HOST", default_value = "res.cloudinary.com")]
    pub asset_delivery_host: String,

    /// Cloud name (account identifier on the asset host)
    #[arg(long, env = "ASSET_CLOUD_NAME", default_value = "")]
    pub asset_cloud_name: String,

    /// API key for signed uploads
    #[arg(long, env = "ASSET_API_KEY", default_value = "")]
    pub asset_api_key: String,

    /// API secret for request signing
    #[arg(long, env = "ASSET_API_SECRET", default_value = "")]
    pub asset_api_secret: String,
}

impl Args {
    /// Get effective JWT secret (uses default in dev mode)
    pub fn jwt_secret(&self) -> String {
        if self.dev_mode {
            self.jwt_secret
                .clone()
                .unwrap_or_else(|| "dev-only-insecure-secret".to_string())
        } else {
            self.jwt_secret
                .clone()
                .expect("JWT_SECRET is required in production mode")
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if !self.dev_mode {
            if self.jwt_secret.is_none() {
                return Err("JWT_SECRET is required in production mode".to_string());
            }
            if self.assets.asset_cloud_name.is_empty() {
                return Err("ASSET_CLOUD_NAME is required in production mode".to_string());
            }
            if self.assets.asset_api_key.is_empty() || self.assets.asset_api_secret.is_empty() {
                return Err(
                    "ASSET_API_KEY and ASSET_API_SECRET are required in production mode"
                        .to_string(),
                );
            }
        }

        Ok(())
    }
}
