use std::fs;
use std::io::Write;
use tempfile::TempDir;

use ragdb_core::config::{BackendKind, Config, RagConfig};
use ragdb_core::loader::DocumentLoader;
use ragdb_core::Error;

#[test]
fn load_dir_single_small_file() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    let mut f = fs::File::create(dir.join("a.txt")).unwrap();
    writeln!(f, "Short text").unwrap();
    fs::write(dir.join("ignored.md"), "not a txt file").unwrap();

    let docs = DocumentLoader::new().load_dir(dir).expect("load");

    assert_eq!(docs.len(), 1, "only .txt files are loaded");
    assert_eq!(docs[0].id, "a");
    assert_eq!(docs[0].text.trim(), "Short text");
}

#[test]
fn load_dir_limited_two_files_limit_one() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    fs::write(dir.join("a.txt"), "alpha bravo").unwrap();
    fs::create_dir(dir.join("nested")).unwrap();
    fs::write(dir.join("nested/b.txt"), "charlie delta").unwrap();

    assert_eq!(DocumentLoader::new().load_dir(dir).unwrap().len(), 2, "walks nested dirs");

    let docs = DocumentLoader::with_limit(1).load_dir(dir).expect("load limited");
    assert_eq!(docs.len(), 1, "limited to one source document");
    assert_eq!(docs[0].id, "a");
}

#[test]
fn load_dir_empty_is_not_an_error() {
    let tmp = TempDir::new().unwrap();
    assert!(DocumentLoader::new().load_dir(tmp.path()).unwrap().is_empty());
}

#[test]
fn defaults_match_documented_surface() {
    let cfg = RagConfig::default();
    assert_eq!(cfg.backend, BackendKind::Local);
    assert_eq!(cfg.chunking.max_tokens_per_chunk, 500);
    assert_eq!(cfg.chunking.overlap_sentences, 100);
    assert_eq!(cfg.retrieval.top_k, 3);
}

#[test]
fn layered_files_override_defaults() {
    let tmp = TempDir::new().unwrap();
    fs::write(
        tmp.path().join("config.toml"),
        "backend = \"local\"\n[local]\nhash_embeddings = true\nhash_dim = 64\n[retrieval]\ntop_k = 7\n",
    )
    .unwrap();
    fs::write(tmp.path().join("config.test.toml"), "[chunking]\nmax_tokens_per_chunk = 120\n").unwrap();

    let cfg = Config::load_from(tmp.path(), "test").unwrap().rag().expect("valid config");
    assert_eq!(cfg.retrieval.top_k, 7);
    assert_eq!(cfg.chunking.max_tokens_per_chunk, 120);
    assert_eq!(cfg.chunking.overlap_sentences, 100, "untouched keys keep defaults");
    assert_eq!(cfg.local.hash_dim, 64);

    let k: usize = Config::load_from(tmp.path(), "test").unwrap().get("retrieval.top_k").unwrap();
    assert_eq!(k, 7);
}

#[test]
fn remote_backend_without_endpoints_is_a_configuration_error() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("config.toml"), "backend = \"remote\"\n").unwrap();
    let err = Config::load_from(tmp.path(), "test").unwrap().rag().unwrap_err();
    assert!(matches!(err, Error::Configuration(_)), "got {err:?}");
}

#[test]
fn local_backend_requires_a_model_or_hash_embeddings() {
    let err = RagConfig::default().validate().unwrap_err();
    assert!(matches!(err, Error::Configuration(_)));

    let mut cfg = RagConfig::default();
    cfg.local.model_dir = Some("models/bge-m3".into());
    cfg.validate().expect("model dir is enough");
}

#[test]
fn api_key_is_redacted_in_debug_output() {
    let mut cfg = RagConfig::default();
    cfg.remote.api_key = Some("super-secret".into());
    let printed = format!("{cfg:?}");
    assert!(!printed.contains("super-secret"));
    assert!(printed.contains("<redacted>"));
}
