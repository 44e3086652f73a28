//! In-process BERT sequence classifier (FinBERT by default).

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use candle_core::{DType, Device, IndexOp, Module, Tensor, D};
use candle_nn::{ops::softmax, Linear, VarBuilder};
use candle_transformers::models::bert::{BertModel, Config};
use finsent_core::{ProviderConfig, ProviderKind};
use hf_hub::{api::sync::Api, Repo, RepoType};
use tokenizers::models::wordpiece::WordPiece;
use tokenizers::normalizers::bert::BertNormalizer;
use tokenizers::pre_tokenizers::bert::BertPreTokenizer;
use tokenizers::processors::bert::BertProcessing;
use tokenizers::{Tokenizer, TruncationParams};

use super::InferenceProvider;
use crate::error::ProviderError;
use crate::types::ClassProbabilities;

/// Number of classes the classifier head must produce, in the order
/// positive, negative, neutral.
const NUM_CLASSES: usize = 3;

/// Loaded classifier, shared read-only across requests.
///
/// Weights are owned in memory and never mutated after [`LocalModelProvider::load`].
/// Each call runs the forward pass on tokio's blocking pool.
pub struct LocalModelProvider {
    model: Arc<SequenceClassifier>,
}

struct SequenceClassifier {
    bert: BertModel,
    pooler: Linear,
    classifier: Linear,
    tokenizer: Tokenizer,
    device: Device,
}

/// Resolved paths of the files that make up a model.
struct ModelFiles {
    config: PathBuf,
    tokenizer: TokenizerFiles,
    weights: PathBuf,
}

/// Either a serialized `tokenizers` pipeline or a bare BERT vocabulary.
enum TokenizerFiles {
    Json(PathBuf),
    /// `vocab.txt`, plus `tokenizer_config.json` when the model ships one.
    WordPiece {
        vocab: PathBuf,
        config: Option<PathBuf>,
    },
}

impl LocalModelProvider {
    /// Load the classifier named by `config`.
    ///
    /// Reads from `model_dir` when set, otherwise fetches `model_id` at
    /// `model_revision` from the Hugging Face hub (cached on disk by `hf-hub`).
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Unavailable`] if any file is missing or the
    /// weights do not match a BERT sequence classifier.
    pub fn load(config: &ProviderConfig) -> Result<Self, ProviderError> {
        let files = match &config.model_dir {
            Some(dir) => files_from_dir(dir)?,
            None => files_from_hub(&config.model_id, &config.model_revision)?,
        };
        let device = Device::Cpu;

        let model_config: Config = serde_json::from_str(
            &std::fs::read_to_string(&files.config).map_err(|e| unavailable(&files.config, e))?,
        )
        .map_err(|e| unavailable(&files.config, e))?;

        let vb = load_weights(&files.weights, &device)?;
        let bert = BertModel::load(vb.pp("bert"), &model_config)
            .map_err(|e| unavailable(&files.weights, e))?;
        let hidden = model_config.hidden_size;
        let pooler = candle_nn::linear(hidden, hidden, vb.pp("bert.pooler.dense"))
            .map_err(|e| unavailable(&files.weights, e))?;
        let classifier = candle_nn::linear(hidden, NUM_CLASSES, vb.pp("classifier"))
            .map_err(|e| unavailable(&files.weights, e))?;

        let tokenizer = load_tokenizer(&files.tokenizer, config.max_sequence_length)?;

        tracing::info!(
            model = %config.model_id,
            weights = %files.weights.display(),
            max_sequence_length = config.max_sequence_length,
            "local classifier loaded"
        );

        Ok(Self {
            model: Arc::new(SequenceClassifier {
                bert,
                pooler,
                classifier,
                tokenizer,
                device,
            }),
        })
    }
}

#[async_trait]
impl InferenceProvider for LocalModelProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Local
    }

    async fn infer(&self, text: &str) -> Result<ClassProbabilities, ProviderError> {
        let model = Arc::clone(&self.model);
        let text = text.to_owned();
        tokio::task::spawn_blocking(move || model.classify(&text)).await?
    }
}

impl SequenceClassifier {
    /// Forward pass: encoder, `[CLS]` pooler with tanh, linear head, softmax.
    fn classify(&self, text: &str) -> Result<ClassProbabilities, ProviderError> {
        let encoding = self.tokenizer.encode(text, true).map_err(|e| {
            ProviderError::Inference(format!(
                "tokenization failed on '{}': {e}",
                text.chars().take(50).collect::<String>()
            ))
        })?;

        let probs = self.forward(
            encoding.get_ids(),
            encoding.get_type_ids(),
            encoding.get_attention_mask(),
        )?;
        class_probabilities(&probs)
    }

    fn forward(
        &self,
        ids: &[u32],
        type_ids: &[u32],
        attention_mask: &[u32],
    ) -> Result<Vec<f32>, ProviderError> {
        let run = || -> candle_core::Result<Vec<f32>> {
            let input_ids = Tensor::new(ids, &self.device)?.unsqueeze(0)?;
            let token_type_ids = Tensor::new(type_ids, &self.device)?.unsqueeze(0)?;
            let mask = Tensor::new(attention_mask, &self.device)?.unsqueeze(0)?;

            let hidden = self.bert.forward(&input_ids, &token_type_ids, Some(&mask))?;
            let cls = hidden.i((.., 0))?;
            let pooled = self.pooler.forward(&cls)?.tanh()?;
            let logits = self.classifier.forward(&pooled)?;
            softmax(&logits, D::Minus1)?.squeeze(0)?.to_vec1::<f32>()
        };
        run().map_err(|e| ProviderError::Inference(e.to_string()))
    }
}

/// Map softmax output onto the fixed label order positive, negative, neutral.
fn class_probabilities(probs: &[f32]) -> Result<ClassProbabilities, ProviderError> {
    match probs {
        [positive, negative, neutral] => Ok(ClassProbabilities::new(
            f64::from(*positive),
            f64::from(*negative),
            f64::from(*neutral),
        )),
        other => Err(ProviderError::Malformed(format!(
            "classifier produced {} classes, expected {NUM_CLASSES}",
            other.len()
        ))),
    }
}

fn files_from_dir(dir: &Path) -> Result<ModelFiles, ProviderError> {
    let existing = |name: &str| -> Option<PathBuf> {
        let path = dir.join(name);
        path.is_file().then_some(path)
    };
    let require = |name: &str| -> Result<PathBuf, ProviderError> {
        existing(name).ok_or_else(|| {
            ProviderError::Unavailable(format!("{name} not found in {}", dir.display()))
        })
    };

    let config = require("config.json")?;
    let tokenizer = match existing("tokenizer.json") {
        Some(path) => TokenizerFiles::Json(path),
        None => TokenizerFiles::WordPiece {
            vocab: existing("vocab.txt").ok_or_else(|| {
                ProviderError::Unavailable(format!(
                    "no tokenizer.json or vocab.txt in {}",
                    dir.display()
                ))
            })?,
            config: existing("tokenizer_config.json"),
        },
    };
    let weights = existing("model.safetensors")
        .or_else(|| existing("pytorch_model.bin"))
        .ok_or_else(|| {
            ProviderError::Unavailable(format!(
                "no model.safetensors or pytorch_model.bin in {}",
                dir.display()
            ))
        })?;

    Ok(ModelFiles {
        config,
        tokenizer,
        weights,
    })
}

fn files_from_hub(model_id: &str, revision: &str) -> Result<ModelFiles, ProviderError> {
    let api = Api::new().map_err(|e| ProviderError::Unavailable(format!("hf-hub: {e}")))?;
    let repo = api.repo(Repo::with_revision(
        model_id.to_string(),
        RepoType::Model,
        revision.to_string(),
    ));
    let fetch = |name: &str| {
        repo.get(name)
            .map_err(|e| ProviderError::Unavailable(format!("{model_id}/{name}: {e}")))
    };

    let config = fetch("config.json")?;
    let tokenizer = match fetch("tokenizer.json") {
        Ok(path) => TokenizerFiles::Json(path),
        Err(_) => TokenizerFiles::WordPiece {
            vocab: fetch("vocab.txt")?,
            config: fetch("tokenizer_config.json").ok(),
        },
    };
    let weights = fetch("model.safetensors").or_else(|_| fetch("pytorch_model.bin"))?;

    Ok(ModelFiles {
        config,
        tokenizer,
        weights,
    })
}

fn load_tokenizer(
    files: &TokenizerFiles,
    max_sequence_length: usize,
) -> Result<Tokenizer, ProviderError> {
    let (mut tokenizer, source) = match files {
        TokenizerFiles::Json(path) => (
            Tokenizer::from_file(path).map_err(|e| unavailable(path, e))?,
            path,
        ),
        TokenizerFiles::WordPiece { vocab, config } => {
            (wordpiece_tokenizer(vocab, config.as_deref())?, vocab)
        }
    };
    tokenizer
        .with_truncation(Some(TruncationParams {
            max_length: max_sequence_length,
            ..Default::default()
        }))
        .map_err(|e| unavailable(source, e))?;
    Ok(tokenizer)
}

/// Uncased-BERT pipeline: clean/lowercase, split on whitespace and punctuation,
/// WordPiece, then wrap in `[CLS] ... [SEP]`.
fn wordpiece_tokenizer(vocab: &Path, config: Option<&Path>) -> Result<Tokenizer, ProviderError> {
    let lowercase = match config {
        Some(path) => do_lower_case(path)?,
        None => true,
    };
    let vocab_file = vocab
        .to_str()
        .ok_or_else(|| unavailable(vocab, "path is not valid UTF-8"))?;
    let model = WordPiece::from_file(vocab_file)
        .unk_token("[UNK]".to_string())
        .build()
        .map_err(|e| unavailable(vocab, e))?;

    let mut tokenizer = Tokenizer::new(model);
    let cls = special_token_id(&tokenizer, "[CLS]", vocab)?;
    let sep = special_token_id(&tokenizer, "[SEP]", vocab)?;
    tokenizer
        .with_normalizer(Some(BertNormalizer::new(true, true, None, lowercase)))
        .with_pre_tokenizer(Some(BertPreTokenizer))
        .with_post_processor(Some(BertProcessing::new(
            ("[SEP]".to_string(), sep),
            ("[CLS]".to_string(), cls),
        )));
    Ok(tokenizer)
}

fn special_token_id(
    tokenizer: &Tokenizer,
    token: &str,
    vocab: &Path,
) -> Result<u32, ProviderError> {
    tokenizer
        .token_to_id(token)
        .ok_or_else(|| unavailable(vocab, format!("vocabulary has no {token} token")))
}

/// `do_lower_case` from `tokenizer_config.json`; BERT checkpoints default to uncased.
fn do_lower_case(path: &Path) -> Result<bool, ProviderError> {
    let raw = std::fs::read_to_string(path).map_err(|e| unavailable(path, e))?;
    let value: serde_json::Value =
        serde_json::from_str(&raw).map_err(|e| unavailable(path, e))?;
    Ok(value
        .get("do_lower_case")
        .and_then(serde_json::Value::as_bool)
        .unwrap_or(true))
}

fn load_weights(path: &Path, device: &Device) -> Result<VarBuilder<'static>, ProviderError> {
    if path.extension().is_some_and(|e| e == "safetensors") {
        let bytes = std::fs::read(path).map_err(|e| unavailable(path, e))?;
        VarBuilder::from_buffered_safetensors(bytes, DType::F32, device)
            .map_err(|e| unavailable(path, e))
    } else {
        VarBuilder::from_pth(path, DType::F32, device).map_err(|e| unavailable(path, e))
    }
}

fn unavailable(path: &Path, e: impl std::fmt::Display) -> ProviderError {
    ProviderError::Unavailable(format!("{}: {e}", path.display()))
}

#[cfg(test)]
mod tests {
    use candle_nn::VarMap;

    use super::*;
    use crate::provider::{init_provider, ProviderState};

    const VOCAB: &[&str] = &[
        "[PAD]", "[UNK]", "[CLS]", "[SEP]", "[MASK]", "profit", "##s", "rose", "fell", "sharply",
        ".", ",",
    ];
    const HIDDEN: usize = 8;
    const MAX_POSITIONS: usize = 16;

    /// Per-test directory under the system temp dir, removed on drop.
    struct ScratchDir(PathBuf);

    impl ScratchDir {
        fn new(name: &str) -> Self {
            let path = std::env::temp_dir()
                .join(format!("finsent-local-{name}-{}", std::process::id()));
            let _ = std::fs::remove_dir_all(&path);
            std::fs::create_dir_all(&path).expect("create scratch dir");
            Self(path)
        }

        fn write(&self, name: &str, contents: &str) {
            std::fs::write(self.0.join(name), contents).expect("write scratch file");
        }
    }

    impl Drop for ScratchDir {
        fn drop(&mut self) {
            let _ = std::fs::remove_dir_all(&self.0);
        }
    }

    fn tiny_bert_config() -> serde_json::Value {
        serde_json::json!({
            "vocab_size": VOCAB.len(),
            "hidden_size": HIDDEN,
            "num_hidden_layers": 1,
            "num_attention_heads": 2,
            "intermediate_size": 16,
            "hidden_act": "gelu",
            "hidden_dropout_prob": 0.1,
            "max_position_embeddings": MAX_POSITIONS,
            "type_vocab_size": 2,
            "initializer_range": 0.02,
            "layer_norm_eps": 1e-12,
            "pad_token_id": 0,
            "model_type": "bert"
        })
    }

    /// Lay out a randomly initialized three-class BERT classifier the way
    /// FinBERT ships: `config.json`, `vocab.txt`, `tokenizer_config.json`,
    /// `model.safetensors`, and no `tokenizer.json`.
    fn write_tiny_classifier(dir: &ScratchDir) {
        let config_json = tiny_bert_config();
        let config: Config = serde_json::from_value(config_json.clone()).expect("bert config");

        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        BertModel::load(vb.pp("bert"), &config).expect("init encoder");
        candle_nn::linear(HIDDEN, HIDDEN, vb.pp("bert.pooler.dense")).expect("init pooler");
        candle_nn::linear(HIDDEN, NUM_CLASSES, vb.pp("classifier")).expect("init head");
        varmap
            .save(dir.0.join("model.safetensors"))
            .expect("save weights");

        dir.write("config.json", &config_json.to_string());
        dir.write("vocab.txt", &VOCAB.join("\n"));
        dir.write("tokenizer_config.json", r#"{"do_lower_case": true}"#);
    }

    fn local_config(dir: &ScratchDir) -> ProviderConfig {
        ProviderConfig {
            kind: ProviderKind::Local,
            model_id: "tiny-bert".to_string(),
            model_revision: "main".to_string(),
            model_dir: Some(dir.0.clone()),
            max_sequence_length: MAX_POSITIONS,
            inference_url: "http://unused".to_string(),
            inference_timeout_secs: 30,
            huggingface_api_key: None,
        }
    }

    fn tokens(tokenizer: &Tokenizer, text: &str) -> Vec<String> {
        tokenizer
            .encode(text, true)
            .expect("encode")
            .get_tokens()
            .to_vec()
    }

    #[test]
    fn softmax_output_maps_in_fixed_order() {
        let probs = class_probabilities(&[0.9, 0.05, 0.05]).expect("three classes");
        assert!((probs.positive - 0.9).abs() < 1e-6);
        assert!((probs.negative - 0.05).abs() < 1e-6);
        assert!((probs.neutral - 0.05).abs() < 1e-6);
    }

    #[test]
    fn wrong_class_count_is_malformed() {
        let err = class_probabilities(&[0.5, 0.5]).unwrap_err();
        assert!(matches!(err, ProviderError::Malformed(_)), "got: {err:?}");
        let err = class_probabilities(&[]).unwrap_err();
        assert!(matches!(err, ProviderError::Malformed(_)), "got: {err:?}");
    }

    #[test]
    fn missing_model_dir_is_unavailable() {
        let err = files_from_dir(Path::new("/nonexistent/finsent/model"))
            .err()
            .expect("missing dir should fail");
        assert!(err.is_unavailable());
        assert!(err.to_string().contains("config.json"), "got: {err}");
    }

    #[test]
    fn vocab_only_dir_resolves_wordpiece_tokenizer() {
        let dir = ScratchDir::new("vocab-only");
        dir.write("config.json", "{}");
        dir.write("vocab.txt", &VOCAB.join("\n"));
        dir.write("tokenizer_config.json", r#"{"do_lower_case": true}"#);
        dir.write("pytorch_model.bin", "");

        let files = files_from_dir(&dir.0).expect("vocab.txt should be enough");
        match files.tokenizer {
            TokenizerFiles::WordPiece { vocab, config } => {
                assert_eq!(vocab, dir.0.join("vocab.txt"));
                assert_eq!(config, Some(dir.0.join("tokenizer_config.json")));
            }
            TokenizerFiles::Json(path) => panic!("unexpected tokenizer.json at {}", path.display()),
        }
        assert_eq!(files.weights, dir.0.join("pytorch_model.bin"));
    }

    #[test]
    fn dir_without_any_tokenizer_is_unavailable() {
        let dir = ScratchDir::new("no-tokenizer");
        dir.write("config.json", "{}");
        dir.write("model.safetensors", "");

        let err = files_from_dir(&dir.0).err().expect("no tokenizer files");
        assert!(err.is_unavailable());
        assert!(err.to_string().contains("vocab.txt"), "got: {err}");
    }

    #[test]
    fn wordpiece_tokenizer_lowercases_and_wraps() {
        let dir = ScratchDir::new("wordpiece-cased");
        dir.write("vocab.txt", &VOCAB.join("\n"));
        let files = TokenizerFiles::WordPiece {
            vocab: dir.0.join("vocab.txt"),
            config: None,
        };

        let tokenizer = load_tokenizer(&files, 512).expect("tokenizer");
        assert_eq!(
            tokens(&tokenizer, "Profits rose."),
            ["[CLS]", "profit", "##s", "rose", ".", "[SEP]"]
        );
    }

    #[test]
    fn wordpiece_tokenizer_honours_do_lower_case_false() {
        let dir = ScratchDir::new("wordpiece-uncased");
        dir.write("vocab.txt", &VOCAB.join("\n"));
        dir.write("tokenizer_config.json", r#"{"do_lower_case": false}"#);
        let files = TokenizerFiles::WordPiece {
            vocab: dir.0.join("vocab.txt"),
            config: Some(dir.0.join("tokenizer_config.json")),
        };

        let tokenizer = load_tokenizer(&files, 512).expect("tokenizer");
        assert_eq!(tokens(&tokenizer, "Profits"), ["[CLS]", "[UNK]", "[SEP]"]);
    }

    #[test]
    fn wordpiece_tokenizer_truncates_to_max_length() {
        let dir = ScratchDir::new("wordpiece-truncate");
        dir.write("vocab.txt", &VOCAB.join("\n"));
        let files = TokenizerFiles::WordPiece {
            vocab: dir.0.join("vocab.txt"),
            config: None,
        };

        let tokenizer = load_tokenizer(&files, 8).expect("tokenizer");
        let long = "profit rose sharply ".repeat(20);
        let encoded = tokens(&tokenizer, &long);
        assert_eq!(encoded.len(), 8);
        assert_eq!(encoded.first().map(String::as_str), Some("[CLS]"));
        assert_eq!(encoded.last().map(String::as_str), Some("[SEP]"));
    }

    #[tokio::test]
    async fn tiny_classifier_loads_and_infers() {
        let dir = ScratchDir::new("tiny-classifier");
        write_tiny_classifier(&dir);

        let state = init_provider(&local_config(&dir));
        let provider = match &state {
            ProviderState::Ready(provider) => Arc::clone(provider),
            ProviderState::Unavailable { .. } => panic!("tiny classifier should load: {state:?}"),
        };
        assert_eq!(provider.kind(), ProviderKind::Local);

        let probs = provider
            .infer("Profits rose sharply.")
            .await
            .expect("forward pass");
        let sum = probs.positive + probs.negative + probs.neutral;
        assert!((sum - 1.0).abs() < 1e-4, "softmax should sum to 1, got {sum}");
        assert!(probs.polarity().is_some(), "{probs:?}");
    }

    #[tokio::test]
    async fn input_longer_than_positions_is_truncated() {
        let dir = ScratchDir::new("tiny-truncate");
        write_tiny_classifier(&dir);
        let provider = LocalModelProvider::load(&local_config(&dir)).expect("load");

        let long = "profits fell sharply , ".repeat(50);
        let probs = provider
            .infer(&long)
            .await
            .expect("long input should be truncated, not rejected");
        assert!(probs.polarity().is_some(), "{probs:?}");
    }
}
