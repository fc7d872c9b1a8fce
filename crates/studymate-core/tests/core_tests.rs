use std::fs;
use tempfile::TempDir;

use studymate_core::chunker::Chunker;
use studymate_core::config::{ChunkingConfig, CombineStrategy, Config, EmbeddingProvider};
use studymate_core::types::Document;

fn chunker(max_chars: usize, overlap_units: usize) -> Chunker {
    Chunker::new(ChunkingConfig { max_chars, overlap_units, min_chars: 0 })
}

#[test]
fn chunking_is_deterministic() {
    let doc = Document::new(
        "d",
        vec![
            "Photosynthesis converts light into energy. It happens in chloroplasts! Why green? Chlorophyll.".into(),
            "Plants use chlorophyll.".into(),
        ],
    );
    let c = chunker(60, 1);
    assert_eq!(c.chunk(&doc), c.chunk(&doc));
}

#[test]
fn blank_pages_yield_nothing_and_ids_stay_dense() {
    let doc = Document::new("d", vec!["First page.".into(), "   \n\t".into(), String::new(), "Last page.".into()]);
    let passages = Chunker::default().chunk(&doc);
    assert_eq!(passages.len(), 2);
    assert_eq!((passages[0].id, passages[0].source_page), (0, 0));
    assert_eq!((passages[1].id, passages[1].source_page), (1, 3));
    assert!(passages.iter().all(|p| p.embedding.is_none()));
}

#[test]
fn consecutive_passages_share_an_overlap_sentence() {
    let doc = Document::new("d", vec!["Alpha one two. Beta three four. Gamma five six.".into()]);
    let passages = chunker(35, 1).chunk(&doc);
    let texts: Vec<_> = passages.iter().map(|p| p.text.as_str()).collect();
    assert_eq!(texts, vec!["Alpha one two. Beta three four.", "Beta three four. Gamma five six."]);
}

#[test]
fn passages_respect_character_budget() {
    let long_sentence = "word ".repeat(80);
    let page = format!("{long_sentence}. Short one. {} Another.", "x".repeat(90));
    let passages = chunker(40, 2).chunk(&Document::new("d", vec![page]));
    assert!(!passages.is_empty());
    for p in &passages {
        assert!(p.text.chars().count() <= 40, "passage too long: {:?}", p.text);
        assert!(!p.text.trim().is_empty());
    }
}

#[test]
fn min_chars_drops_tiny_passages() {
    let doc = Document::new("d", vec!["Ok.".into(), "A longer sentence here.".into()]);
    let passages = Chunker::new(ChunkingConfig { max_chars: 500, overlap_units: 1, min_chars: 5 }).chunk(&doc);
    assert_eq!(passages.len(), 1);
    assert_eq!(passages[0].id, 0);
    assert_eq!(passages[0].source_page, 1);
}

#[test]
fn config_file_overrides_defaults() {
    let tmp = TempDir::new().unwrap();
    fs::write(
        tmp.path().join("config.toml"),
        "[retrieval]\ntop_k = 7\n\n[orchestrator]\ncombine = \"most_structured\"\n\n[embedding]\nprovider = \"hash\"\n",
    )
    .unwrap();

    let settings = Config::load_from_dir(tmp.path()).expect("load").settings().expect("settings");
    assert_eq!(settings.retrieval.top_k, 7);
    assert_eq!(settings.retrieval.seven_mark_top_k, 3);
    assert_eq!(settings.orchestrator.combine, CombineStrategy::MostStructured);
    assert_eq!(settings.embedding.provider, EmbeddingProvider::Hash);
    assert_eq!(settings.chunking.max_chars, 500);
}

#[test]
fn missing_config_file_uses_defaults() {
    let tmp = TempDir::new().unwrap();
    let settings = Config::load_from_dir(tmp.path()).expect("load").settings().expect("settings");
    assert_eq!(settings.orchestrator.timeout_ms, 30_000);
    assert!((settings.retrieval.min_score - 0.1).abs() < f32::EPSILON);
    assert!(settings.backends.local.enabled);
}

#[test]
fn out_of_range_min_score_is_rejected() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("config.toml"), "[retrieval]\nmin_score = 2.5\n").unwrap();
    assert!(Config::load_from_dir(tmp.path()).is_err());
}

#[test]
fn partial_backend_section_keeps_other_defaults() {
    let config = Config::from_toml_str("[backends.gemini]\nmodel = \"gemini-pro\"\n[backends.openai]\nenabled = false\n");
    let settings = config.settings().expect("settings");
    assert_eq!(settings.backends.gemini.model.as_deref(), Some("gemini-pro"));
    assert!(settings.backends.gemini.enabled);
    assert_eq!(settings.backends.gemini.max_output_tokens, 500);
    assert!(!settings.backends.openai.enabled);
    let top_k: usize = config.get("retrieval.top_k").expect("key");
    assert_eq!(top_k, 5);
}

#[test]
fn explicit_api_key_wins_and_blank_is_missing() {
    let mut cfg = Config::from_toml_str("[backends.openai]\napi_key = \"sk-test\"\n").settings().unwrap().backends.openai;
    assert_eq!(cfg.resolve_api_key("STUDYMATE_TEST_UNSET_KEY").as_deref(), Some("sk-test"));
    cfg.api_key = Some("  ".into());
    assert_eq!(cfg.resolve_api_key("STUDYMATE_TEST_UNSET_KEY"), None);
}
