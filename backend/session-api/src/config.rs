use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub bind_addr: String,
    pub scorer_url: String,
    pub interviewer_url: String,
    pub assistant_url: String,
    pub compiler_url: String,
    pub question_catalog: Option<String>,
    pub fullscreen_ack_ms: u64,
    pub collaborator_timeout_secs: u64,
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        dotenvy::dotenv().ok();

        // Determine environment (defaults to dev)
        let env = env::var("APP_ENV").unwrap_or_else(|_| "dev".to_string());

        // Build configuration from config/*.toml + ENV overrides
        let settings = config::Config::builder()
            .add_source(
                config::File::with_name(&format!("config/{}", env)).required(false), // Allow missing config file, fallback to ENV
            )
            .add_source(config::Environment::with_prefix("APP").separator("__"))
            .build()?;

        let bind_addr = settings
            .get_string("server.bind_addr")
            .or_else(|_| env::var("BIND_ADDR"))
            .unwrap_or_else(|_| "0.0.0.0:8082".to_string());

        let scorer_url = settings
            .get_string("collaborators.scorer_url")
            .or_else(|_| env::var("SCORER_URL"))
            .unwrap_or_else(|_| "http://localhost:8000/api/score".to_string());

        let interviewer_url = settings
            .get_string("collaborators.interviewer_url")
            .or_else(|_| env::var("INTERVIEWER_URL"))
            .unwrap_or_else(|_| "http://localhost:8000/api/interviewer".to_string());

        let assistant_url = settings
            .get_string("collaborators.assistant_url")
            .or_else(|_| env::var("ASSISTANT_URL"))
            .unwrap_or_else(|_| "http://localhost:8000/api/candidate".to_string());

        let compiler_url = settings
            .get_string("collaborators.compiler_url")
            .or_else(|_| env::var("COMPILER_URL"))
            .unwrap_or_else(|_| "http://localhost:8000/api/compile".to_string());

        let question_catalog = settings
            .get_string("questions.catalog_path")
            .ok()
            .or_else(|| env::var("QUESTION_CATALOG").ok())
            .filter(|path| !path.trim().is_empty());

        let fullscreen_ack_ms = settings
            .get_string("proctoring.fullscreen_ack_ms")
            .ok()
            .or_else(|| env::var("FULLSCREEN_ACK_MS").ok())
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|v| *v > 0)
            .unwrap_or(10_000);

        let collaborator_timeout_secs = settings
            .get_string("collaborators.timeout_secs")
            .ok()
            .or_else(|| env::var("COLLABORATOR_TIMEOUT_SECS").ok())
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|v| *v > 0)
            .unwrap_or(20);

        Ok(Config {
            bind_addr,
            scorer_url,
            interviewer_url,
            assistant_url,
            compiler_url,
            question_catalog,
            fullscreen_ack_ms,
            collaborator_timeout_secs,
        })
    }
}
