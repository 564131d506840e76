use crate::error::{Error, Result};
use dotenvy::dotenv;
use std::env;
use std::sync::OnceLock;

const DEFAULT_GEMINI_MODELS: &str = "gemini-1.5-flash,gemini-1.5-pro,gemini-1.0-pro";
const DEFAULT_OPENAI_MODELS: &str = "gpt-4o-mini";

#[derive(Debug, Clone)]
pub struct Config {
    pub server_address: String,
    pub database_url: String,
    pub google_api_key: Option<String>,
    pub gemini_models: Vec<String>,
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub openai_models: Vec<String>,
    pub ai_timeout_secs: u64,
    pub generate_rps: u32,
    /// Marks assigned to synthesized placeholder questions.
    pub synthetic_marks: i32,
    pub draft_text_fallback: bool,
    pub libreoffice_bin: String,
    pub public_base_url: String,
}

pub static CONFIG: OnceLock<Config> = OnceLock::new();

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        Ok(Self {
            server_address: get_env("SERVER_ADDRESS")?,
            database_url: get_env("DATABASE_URL")?,
            google_api_key: get_env_opt("GOOGLE_API_KEY"),
            gemini_models: parse_list(
                &get_env_opt("GEMINI_MODELS").unwrap_or_else(|| DEFAULT_GEMINI_MODELS.to_string()),
            ),
            openai_api_key: get_env_opt("OPENAI_API_KEY"),
            openai_base_url: get_env_opt("OPENAI_BASE_URL")
                .unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
            openai_models: parse_list(
                &get_env_opt("OPENAI_MODELS").unwrap_or_else(|| DEFAULT_OPENAI_MODELS.to_string()),
            ),
            ai_timeout_secs: get_env_parse_or("AI_TIMEOUT_SECS", 120)?,
            generate_rps: get_env_parse_or("GENERATE_RPS", 5)?,
            synthetic_marks: get_env_parse_or("SYNTHETIC_MARKS", 3)?,
            draft_text_fallback: get_env_parse_or("DRAFT_TEXT_FALLBACK", false)?,
            libreoffice_bin: get_env_opt("LIBREOFFICE_BIN")
                .unwrap_or_else(|| "libreoffice".to_string()),
            public_base_url: get_env_opt("PUBLIC_BASE_URL")
                .unwrap_or_default()
                .trim_end_matches('/')
                .to_string(),
        })
    }
}

fn get_env(name: &str) -> Result<String> {
    env::var(name).map_err(|_| Error::Config(format!("Missing environment variable: {}", name)))
}

fn get_env_opt(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn get_env_parse_or<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match get_env_opt(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| Error::Config(format!("Invalid value for {}: {}", name, e))),
        None => Ok(default),
    }
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn init_config() -> Result<()> {
    let config = Config::from_env()?;
    CONFIG
        .set(config)
        .map_err(|_| Error::Config("Configuration has already been initialized".to_string()))?;
    Ok(())
}

pub fn get_config() -> &'static Config {
    CONFIG
        .get()
        .expect("Configuration has not been initialized")
}
