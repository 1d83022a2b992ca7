//! Application configuration, loaded from a YAML file.
//!
//! Every tunable has a default, so a minimal config only needs the API
//! credentials and the two directories:
//!
//! ```yaml
//! api_key: "sk-..."
//! api_base: "https://api.groq.com/openai/v1"
//! documents_dir: "/srv/sop/documents"
//! index_dir: "/srv/sop/index"
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::{error::Error, fs};

/// Configuration for the assistant: API endpoint, models, directories, and
/// the retrieval/generation tunables.
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
pub struct SopAssistConfig {
    /// API key for the OpenAI-compatible endpoint.
    pub api_key: String,

    /// Base URL of the OpenAI-compatible endpoint.
    pub api_base: String,

    /// Model used for premium-tier requests.
    #[serde(default = "default_premium_model")]
    pub premium_model: String,

    /// Model used for standard-tier requests.
    #[serde(default = "default_standard_model")]
    pub standard_model: String,

    /// Sentence embedding model fetched from the Hugging Face Hub.
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    /// Folder scanned during bulk ingest.
    pub documents_dir: PathBuf,

    /// Directory holding the persisted vector index.
    pub index_dir: PathBuf,

    /// Sentences per chunk.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Sentences shared between consecutive chunks.
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,

    /// Nearest neighbors fetched per query.
    #[serde(default = "default_retriever_k")]
    pub retriever_k: usize,

    /// Distance cutoff for retrieved chunks.
    #[serde(default = "default_similarity_threshold")]
    pub retriever_similarity_threshold: f32,

    /// Approximate token budget for assembled context.
    #[serde(default = "default_max_context_tokens")]
    pub max_context_tokens: usize,

    /// Question/answer pairs of history carried into chat prompts.
    #[serde(default = "default_max_history_messages")]
    pub max_history_messages: usize,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_top_p")]
    pub top_p: f32,

    /// Response length cap forwarded to the provider.
    #[serde(default = "default_max_response_tokens")]
    pub max_response_tokens: u32,
}

fn default_premium_model() -> String {
    "llama-3.3-70b-versatile".to_string()
}

fn default_standard_model() -> String {
    "llama3-8b-8192".to_string()
}

fn default_embedding_model() -> String {
    "sentence-transformers/all-MiniLM-L6-v2".to_string()
}

fn default_chunk_size() -> usize {
    20
}

fn default_chunk_overlap() -> usize {
    5
}

fn default_retriever_k() -> usize {
    5
}

fn default_similarity_threshold() -> f32 {
    0.5
}

fn default_max_context_tokens() -> usize {
    3000
}

fn default_max_history_messages() -> usize {
    4
}

fn default_temperature() -> f32 {
    0.7
}

fn default_top_p() -> f32 {
    0.9
}

fn default_max_response_tokens() -> u32 {
    4096
}

impl SopAssistConfig {
    /// A default configuration pointing at the given directories, used by
    /// `init` to scaffold a config file the user then edits.
    pub fn new(documents_dir: PathBuf, index_dir: PathBuf) -> Self {
        Self {
            api_key: String::new(),
            api_base: "https://api.groq.com/openai/v1".to_string(),
            premium_model: default_premium_model(),
            standard_model: default_standard_model(),
            embedding_model: default_embedding_model(),
            documents_dir,
            index_dir,
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            retriever_k: default_retriever_k(),
            retriever_similarity_threshold: default_similarity_threshold(),
            max_context_tokens: default_max_context_tokens(),
            max_history_messages: default_max_history_messages(),
            temperature: default_temperature(),
            top_p: default_top_p(),
            max_response_tokens: default_max_response_tokens(),
        }
    }
}

/// Load the configuration from a YAML file at `file`.
pub fn load_config(file: &str) -> Result<SopAssistConfig, Box<dyn Error>> {
    let content = fs::read_to_string(file)?;
    let config: SopAssistConfig = serde_yaml::from_str(&content)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_config_valid_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
api_key: "example_api_key"
api_base: "http://example.com"
documents_dir: "/tmp/docs"
index_dir: "/tmp/index"
chunk_size: 12
"#
        )
        .unwrap();

        let config = load_config(temp_file.path().to_str().unwrap());

        assert!(config.is_ok());
        let config = config.unwrap();
        assert_eq!(config.api_key, "example_api_key");
        assert_eq!(config.api_base, "http://example.com");
        assert_eq!(config.documents_dir, PathBuf::from("/tmp/docs"));
        // explicit value wins over the default
        assert_eq!(config.chunk_size, 12);
        // omitted values fall back to defaults
        assert_eq!(config.chunk_overlap, 5);
        assert_eq!(config.retriever_k, 5);
        assert_eq!(config.max_context_tokens, 3000);
        assert_eq!(config.premium_model, "llama-3.3-70b-versatile");
    }

    #[test]
    fn test_load_config_invalid_file() {
        let config = load_config("non/existent/path");
        assert!(config.is_err());
    }

    #[test]
    fn test_load_config_invalid_format() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, r#"invalid: config: format"#).unwrap();
        let config = load_config(temp_file.path().to_str().unwrap());
        assert!(config.is_err());
    }
}
