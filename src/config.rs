// src/config.rs

use dotenvy::dotenv;
use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub jwt_expiration: u64,
    pub rust_log: String,
    pub upload_dir: String,
    /// When absent, question generation falls back to the mock set.
    pub groq_api_key: Option<String>,
    pub groq_model: String,
    pub professor_username: Option<String>,
    pub professor_password: Option<String>,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");

        let jwt_secret = env::var("JWT_SECRET").expect("JWT_SECRET must be set");

        let jwt_expiration = env::var("JWT_EXPIRATION")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(86_400);

        let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        let upload_dir = env::var("UPLOAD_DIR").unwrap_or_else(|_| "uploads".to_string());

        let groq_api_key = env::var("GROQ_API_KEY").ok().filter(|key| !key.is_empty());

        let groq_model =
            env::var("GROQ_MODEL").unwrap_or_else(|_| "llama-3.1-70b-versatile".to_string());

        let professor_username = env::var("PROFESSOR_USERNAME").ok();
        let professor_password = env::var("PROFESSOR_PASSWORD").ok();

        Self {
            database_url,
            jwt_secret,
            jwt_expiration,
            rust_log,
            upload_dir,
            groq_api_key,
            groq_model,
            professor_username,
            professor_password,
        }
    }
}
