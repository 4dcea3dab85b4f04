//! BGE-M3 sentence embeddings on an XLM-RoBERTa backbone, run in-process with candle.

use anyhow::{Context, Result, anyhow, ensure};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::xlm_roberta::{Config as XLMRobertaConfig, XLMRobertaModel};
use tokenizers::Tokenizer;
use tracing::{debug, info};

use crate::device::select_device;
use crate::pool::masked_mean_l2;
use crate::tokenize::tokenize_on_device;
use crate::Encoder;

const MAX_LEN: usize = 256;

pub struct BgeM3Model {
    model: XLMRobertaModel,
    tokenizer: Tokenizer,
    device: Device,
    dim: usize,
}

/// Files a model directory must contain.
pub fn model_files(model_dir: &Path) -> [PathBuf; 3] {
    [
        model_dir.join("tokenizer.json"),
        model_dir.join("config.json"),
        model_dir.join("pytorch_model.bin"),
    ]
}

impl BgeM3Model {
    pub fn load(model_dir: &Path) -> Result<Self> {
        for file in model_files(model_dir) {
            ensure!(file.exists(), "model file missing: {}", file.display());
        }
        let [tokenizer_path, config_path, weights_path] = model_files(model_dir);
        let device = select_device();
        info!("Loading BGE-M3 model from {}", model_dir.display());

        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow!("Failed to load tokenizer from {}: {}", tokenizer_path.display(), e))?;
        let config_text = std::fs::read_to_string(&config_path)
            .with_context(|| format!("reading {}", config_path.display()))?;
        let config: XLMRobertaConfig = serde_json::from_str(&config_text)?;

        let weights = candle_core::pickle::read_all(&weights_path)?;
        let weights_map: HashMap<String, Tensor> = weights.into_iter().collect();
        let vb = VarBuilder::from_tensors(weights_map, DType::F32, &device);
        let model = XLMRobertaModel::new(&config, vb)?;
        let dim = config.hidden_size;
        info!(dim, "BGE-M3 model loaded");
        Ok(Self { model, tokenizer, device, dim })
    }
}

impl Encoder for BgeM3Model {
    fn id(&self) -> &str { "bge-m3" }

    fn dim(&self) -> usize { self.dim }

    fn encode(&self, text: &str) -> Result<Vec<f32>> {
        let start = Instant::now();
        let (input_ids, attention_mask) = tokenize_on_device(&self.tokenizer, text, MAX_LEN, &self.device)?;
        let token_type_ids = Tensor::zeros((1, MAX_LEN), DType::I64, &self.device)?;
        let hidden = self.model.forward(&input_ids, &attention_mask, &token_type_ids, None, None, None)?;
        let pooled = masked_mean_l2(&hidden, &attention_mask)?;
        let emb: Vec<f32> = pooled.to_device(&Device::Cpu)?.squeeze(0)?.to_vec1()?;
        ensure!(emb.len() == self.dim, "model produced {}-d vector, expected {}", emb.len(), self.dim);
        debug!(elapsed_ms = start.elapsed().as_millis() as u64, "encoded text");
        Ok(emb)
    }
}
