use dotenvy::dotenv;
use once_cell::sync::Lazy;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::invoker::AnalyzerCommand;

pub static CONFIG: Lazy<Config> = Lazy::new(|| {
    dotenv().ok(); // Load .env file if present
    let deployment = Deployment::from_env_value(&get_env_or_default("APP_ENV", "development"));
    Config {
        port: parse_env_or_default("PORT", 3000),
        analyzer_program: get_env_or_default("ANALYZER_PROGRAM", "python3"),
        analyzer_script: env::var("ANALYZER_SCRIPT")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| deployment.default_script()),
        analyzer_timeout: Duration::from_secs(parse_env_or_default("ANALYZER_TIMEOUT_SECS", 90)),
        body_limit_bytes: parse_env_or_default("BODY_LIMIT_BYTES", 1024 * 1024),
        static_dir: PathBuf::from(get_env_or_default("STATIC_DIR", "public")),
        deployment,
    }
});

/// Selects where the analyzer lives on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deployment {
    Development,
    Production,
}

impl Deployment {
    pub fn from_env_value(value: &str) -> Deployment {
        match value.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Deployment::Production,
            _ => Deployment::Development,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Deployment::Development => "development",
            Deployment::Production => "production",
        }
    }

    fn default_script(&self) -> PathBuf {
        match self {
            Deployment::Development => PathBuf::from("backend/scrapers/perplexity_analyzer.py"),
            Deployment::Production => PathBuf::from("/app/backend/scrapers/perplexity_analyzer.py"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub deployment: Deployment,
    pub analyzer_program: String,
    pub analyzer_script: PathBuf,
    pub analyzer_timeout: Duration,
    pub body_limit_bytes: usize,
    pub static_dir: PathBuf,
}

impl Config {
    pub fn analyzer_command(&self) -> AnalyzerCommand {
        AnalyzerCommand::new(&self.analyzer_program)
            .leading_arg(self.analyzer_script.to_string_lossy())
            .env("PYTHONUNBUFFERED", "1")
            .env("PYTHONIOENCODING", "utf-8")
    }
}

fn get_env_or_default(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_env_or_default<T: FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .unwrap_or_else(|_| panic!("Invalid value for environment variable {key}: {raw:?}")),
        Err(_) => default,
    }
}
