//! # Sentence embeddings
//!
//! Converts text into dense vectors with a BERT-family model running on
//! Candle (pure Rust ML framework). Model weights, config, and tokenizer are
//! fetched from the Hugging Face Hub on first use and cached locally.
//!
//! The rest of the crate only sees the [`Embedder`] trait, so tests swap in
//! deterministic stub embedders and never touch the Hub.

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config, DTYPE};
use hf_hub::{api::sync::Api, Repo, RepoType};
use tokenizers::Tokenizer;

use crate::error::EmbedError;

/// Embeds text into fixed-dimension vectors.
///
/// Implementations must return vectors of exactly [`dimension`](Self::dimension)
/// elements. Equal inputs must embed to equal vectors within one process.
pub trait Embedder: Send + Sync {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError>;
    fn dimension(&self) -> usize;
}

/// BERT sentence embedder: mean pooling over the attention mask followed by
/// L2 normalization, the standard sentence-transformers recipe.
pub struct BertEmbedder {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
    dimension: usize,
}

impl BertEmbedder {
    /// Load `model_id` (e.g. `sentence-transformers/all-MiniLM-L6-v2`) from
    /// the Hugging Face Hub. The embedding dimension is read from the model
    /// config rather than assumed.
    pub fn load(model_id: &str) -> Result<Self, EmbedError> {
        let device = Device::Cpu;
        let load_err = |e: String| EmbedError::ModelLoad {
            model: model_id.to_string(),
            reason: e,
        };

        let repo = Repo::with_revision(model_id.to_string(), RepoType::Model, "main".to_string());
        let api = Api::new().map_err(|e| load_err(e.to_string()))?;
        let api_repo = api.repo(repo);

        let config_filename = api_repo
            .get("config.json")
            .map_err(|e| load_err(e.to_string()))?;
        let tokenizer_filename = api_repo
            .get("tokenizer.json")
            .map_err(|e| load_err(e.to_string()))?;
        let weights_filename = api_repo
            .get("model.safetensors")
            .map_err(|e| load_err(e.to_string()))?;

        let config = std::fs::read_to_string(config_filename)
            .map_err(|e| load_err(e.to_string()))?;
        let config: Config =
            serde_json::from_str(&config).map_err(|e| load_err(e.to_string()))?;
        let dimension = config.hidden_size;

        let tokenizer = Tokenizer::from_file(tokenizer_filename)
            .map_err(|e| load_err(format!("failed to load tokenizer: {e}")))?;

        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[weights_filename], DTYPE, &device)
                .map_err(|e| load_err(e.to_string()))?
        };
        let model = BertModel::load(vb, &config).map_err(|e| load_err(e.to_string()))?;

        Ok(Self {
            model,
            tokenizer,
            device,
            dimension,
        })
    }

    fn encode(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        let infer_err = |e: String| EmbedError::Inference(e);

        // Tokenize with automatic truncation at the model's max length
        let tokens = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| infer_err(format!("tokenization error: {e}")))?;

        let token_ids = Tensor::new(tokens.get_ids(), &self.device)
            .and_then(|t| t.unsqueeze(0))
            .map_err(|e| infer_err(e.to_string()))?;
        let token_type_ids = Tensor::new(tokens.get_type_ids(), &self.device)
            .and_then(|t| t.unsqueeze(0))
            .map_err(|e| infer_err(e.to_string()))?;

        let output = self
            .model
            .forward(&token_ids, &token_type_ids, None)
            .map_err(|e| infer_err(e.to_string()))?;

        let pooled = self
            .mean_pooling(&output, tokens.get_attention_mask())
            .map_err(|e| infer_err(e.to_string()))?;
        let normalized = Self::normalize(&pooled).map_err(|e| infer_err(e.to_string()))?;

        normalized
            .to_vec1::<f32>()
            .map_err(|e| infer_err(e.to_string()))
    }

    /// Mean pooling over token embeddings, weighted by the attention mask.
    fn mean_pooling(
        &self,
        embeddings: &Tensor,
        attention_mask: &[u32],
    ) -> Result<Tensor, candle_core::Error> {
        // embeddings: [1, seq_len, hidden]; mask must broadcast as [1, seq_len, 1]
        let mask = Tensor::new(attention_mask, &self.device)?
            .to_dtype(DType::F32)?
            .unsqueeze(0)?
            .unsqueeze(2)?;

        let masked = embeddings.broadcast_mul(&mask)?;
        let sum = masked.sum(1)?;
        let count = mask.sum(1)?.clamp(1f32, f32::INFINITY)?;
        let mean = sum.broadcast_div(&count)?;
        mean.squeeze(0)
    }

    /// L2 normalize so stored and query vectors live on the unit sphere.
    fn normalize(tensor: &Tensor) -> Result<Tensor, candle_core::Error> {
        let norm = tensor.sqr()?.sum_all()?.sqrt()?;
        tensor.broadcast_div(&norm)
    }
}

impl Embedder for BertEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        self.encode(text)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}
