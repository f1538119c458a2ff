use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::llm::client::{OpenAiFactory, DEFAULT_BASE_URL, DEFAULT_MODEL};
use crate::pipeline::PipelineConfig;
use crate::topics::cluster::{ClusterConfig, ClusterMode};
use crate::topics::embeddings::OnnxLoader;
use crate::topics::hashing::HashingLoader;
use crate::topics::traits::EmbedderLoader;

pub const DEFAULT_EMBEDDING_MODEL: &str = "all-MiniLM-L6-v2";
pub const DEFAULT_BIND: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 5001;

/// Which embedder backend to use.
#[derive(Debug, Clone, PartialEq)]
pub enum EmbedderBackend {
    /// Local ONNX sentence model (default)
    Onnx,
    /// Lexical feature hashing, no model files needed
    Hashing,
}

impl EmbedderBackend {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "onnx" => Some(Self::Onnx),
            "hashing" => Some(Self::Hashing),
            _ => None,
        }
    }
}

/// Central configuration loaded from environment variables.
///
/// The .env file is loaded automatically at startup via dotenvy. The
/// completion-service credential is deliberately absent: it only ever
/// arrives in a request body.
#[derive(Debug, Clone)]
pub struct Config {
    pub bind: String,
    pub port: u16,
    /// Directory containing one subdirectory per embedding model
    pub model_dir: PathBuf,
    pub embedder_backend: EmbedderBackend,
    pub embedding_model: String,
    pub cluster_mode: ClusterMode,
    pub num_clusters: usize,
    pub min_cluster_size: usize,
    /// Chat-completions API root (OpenAI-compatible)
    pub openai_base_url: String,
    /// Model used for topic labels and summaries
    pub label_model: String,
    pub llm_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.to_string(),
            port: DEFAULT_PORT,
            model_dir: crate::download::default_model_dir(),
            embedder_backend: EmbedderBackend::Onnx,
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            cluster_mode: ClusterMode::Deterministic,
            num_clusters: 5,
            min_cluster_size: 5,
            openai_base_url: DEFAULT_BASE_URL.to_string(),
            label_model: DEFAULT_MODEL.to_string(),
            llm_timeout: Duration::from_secs(60),
        }
    }
}

impl Config {
    /// Load configuration from environment variables. Unset variables keep
    /// their defaults; malformed ones are an error.
    pub fn load() -> Result<Self> {
        let defaults = Self::default();

        let embedder_backend = match env::var("TOPICAL_EMBEDDER") {
            Ok(raw) => EmbedderBackend::parse(&raw).with_context(|| {
                format!("TOPICAL_EMBEDDER must be 'onnx' or 'hashing', got '{raw}'")
            })?,
            Err(_) => defaults.embedder_backend,
        };

        let cluster_mode = match env::var("TOPICAL_CLUSTER_MODE") {
            Ok(raw) => ClusterMode::parse(&raw).with_context(|| {
                format!("TOPICAL_CLUSTER_MODE must be 'deterministic' or 'density', got '{raw}'")
            })?,
            Err(_) => defaults.cluster_mode,
        };

        Ok(Self {
            bind: env::var("TOPICAL_BIND").unwrap_or(defaults.bind),
            port: parse_var("TOPICAL_PORT", defaults.port)?,
            model_dir: env::var("TOPICAL_MODEL_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.model_dir),
            embedder_backend,
            embedding_model: env::var("TOPICAL_EMBEDDING_MODEL").unwrap_or(defaults.embedding_model),
            cluster_mode,
            num_clusters: parse_var("TOPICAL_NUM_CLUSTERS", defaults.num_clusters)?,
            min_cluster_size: parse_var("TOPICAL_MIN_CLUSTER_SIZE", defaults.min_cluster_size)?,
            openai_base_url: env::var("TOPICAL_OPENAI_BASE_URL").unwrap_or(defaults.openai_base_url),
            label_model: env::var("TOPICAL_LABEL_MODEL").unwrap_or(defaults.label_model),
            llm_timeout: Duration::from_secs(parse_var(
                "TOPICAL_LLM_TIMEOUT_SECS",
                defaults.llm_timeout.as_secs(),
            )?),
        })
    }

    /// Validate that the chosen embedder has what it needs.
    /// For ONNX: model files must exist (or user should run download-model).
    pub fn require_embedder(&self) -> Result<()> {
        if self.embedder_backend == EmbedderBackend::Onnx
            && !crate::download::embedding_files_present(&self.model_dir, &self.embedding_model)
        {
            anyhow::bail!(
                "ONNX embedding model not found in {}\n\
                 Run `topical download-model` to download it.\n\
                 Or set TOPICAL_EMBEDDER=hashing to run without model files.",
                crate::download::embedding_model_dir(&self.model_dir, &self.embedding_model)
                    .display()
            );
        }
        Ok(())
    }

    pub fn embedder_loader(&self) -> Arc<dyn EmbedderLoader> {
        match self.embedder_backend {
            EmbedderBackend::Onnx => Arc::new(OnnxLoader {
                model_dir: self.model_dir.clone(),
            }),
            EmbedderBackend::Hashing => Arc::new(HashingLoader),
        }
    }

    pub fn chat_factory(&self) -> OpenAiFactory {
        OpenAiFactory {
            base_url: self.openai_base_url.clone(),
            model: self.label_model.clone(),
            timeout: self.llm_timeout,
            ..OpenAiFactory::default()
        }
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            embedding_model: self.embedding_model.clone(),
            cluster: ClusterConfig {
                mode: self.cluster_mode,
                num_clusters: self.num_clusters,
                min_cluster_size: self.min_cluster_size,
                ..ClusterConfig::default()
            },
        }
    }
}

fn parse_var<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("{name} has an invalid value '{raw}': {e}")),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.port, 5001);
        assert_eq!(config.cluster_mode, ClusterMode::Deterministic);
        assert_eq!(config.pipeline_config().cluster.num_clusters, 5);
        assert_eq!(config.chat_factory().model, "gpt-3.5-turbo");
    }

    #[test]
    fn test_embedder_backend_parse() {
        assert_eq!(EmbedderBackend::parse("Hashing"), Some(EmbedderBackend::Hashing));
        assert_eq!(EmbedderBackend::parse(" onnx "), Some(EmbedderBackend::Onnx));
        assert_eq!(EmbedderBackend::parse("hasing"), None);
    }

    #[test]
    fn test_hashing_backend_needs_no_files() {
        let config = Config {
            embedder_backend: EmbedderBackend::Hashing,
            model_dir: PathBuf::from("/nonexistent"),
            ..Config::default()
        };
        assert!(config.require_embedder().is_ok());
    }

    #[test]
    fn test_missing_onnx_files_reported() {
        let config = Config {
            model_dir: PathBuf::from("/nonexistent/topical"),
            ..Config::default()
        };
        let err = config.require_embedder().unwrap_err().to_string();
        assert!(err.contains("download-model"));
    }
}
