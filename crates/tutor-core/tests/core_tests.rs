use std::fs;
use std::io::Write;
use tempfile::TempDir;

use pretty_assertions::assert_eq;
use tutor_core::chunker::{chunk, Chunker, ChunkingConfig};
use tutor_core::config::Config;
use tutor_core::data_processor::DataProcessor;

fn sentences(n: usize) -> String {
    (0..n).map(|i| format!("Sentence number {:02} has some filler text.", i)).collect::<Vec<_>>().join(" ")
}

#[test]
fn chunking_is_deterministic_and_bounded() {
    let text = sentences(200);
    let a = chunk(&text, 300, 50);
    let b = chunk(&text, 300, 50);
    assert_eq!(a, b, "same input, same chunks");
    assert!(a.len() > 1);
    for c in &a {
        assert!(!c.trim().is_empty());
        assert!(c.chars().count() <= 1400, "chunk within ceiling ({} chars)", c.chars().count());
    }
}

#[test]
fn next_chunk_is_seeded_with_trailing_overlap() {
    let text = sentences(12);
    let chunks = chunk(&text, 30, 5);
    assert!(chunks.len() >= 2);
    for pair in chunks.windows(2) {
        let prev: Vec<char> = pair[0].chars().collect();
        let tail: String = prev[prev.len().saturating_sub(20)..].iter().collect();
        assert!(pair[1].starts_with(tail.trim_start()), "{:?} should start with {:?}", pair[1], tail);
    }
}

#[test]
fn zero_overlap_preserves_every_sentence_once() {
    let text = sentences(12);
    let chunks = chunk(&text, 30, 0);
    assert_eq!(chunks.join(" "), text);
}

#[test]
fn unpunctuated_text_is_clamped_to_ceiling() {
    let text = "abcdefghij".repeat(500);
    let chunks = chunk(&text, 300, 50);
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].chars().count(), 1400);
}

#[test]
fn oversized_documents_are_truncated_before_splitting() {
    let config = ChunkingConfig { max_document_chars: 41, ..ChunkingConfig::default() };
    let chunks = Chunker::new(config).chunk(&sentences(10));
    assert_eq!(chunks, vec!["Sentence number 00 has some filler text.".to_string()]);
}

#[test]
fn blank_input_yields_no_chunks() {
    assert!(chunk("", 300, 50).is_empty());
    assert!(chunk("   \n\t  ", 300, 50).is_empty());
    assert!(chunk(".  !  ?", 300, 50).iter().all(|c| !c.is_empty()));
}

#[test]
fn single_markdown_file_becomes_one_chunk() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("Intro.md"), "Plants make food from light. They need **water** too! Do they need soil?\n").unwrap();

    let corpus = DataProcessor::default().process_directory(tmp.path());

    assert_eq!(corpus.chunks.len(), 1);
    assert_eq!(corpus.chunks[0].source, "Intro.md");
    assert_eq!(corpus.chunks[0].ordinal, 0);
    assert_eq!(corpus.chunks[0].text, "Plants make food from light. They need water too! Do they need soil?");
}

#[test]
fn process_directory_orders_ordinals_per_file_and_skips_hidden() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    fs::create_dir_all(dir.join("week1")).unwrap();
    let mut f = fs::File::create(dir.join("week1/notes.txt")).unwrap();
    writeln!(f, "{}", sentences(40)).unwrap();
    fs::write(dir.join("a.txt"), "alpha bravo.").unwrap();
    fs::write(dir.join(".hidden.txt"), "secret.").unwrap();

    let processor = DataProcessor::new(ChunkingConfig { max_tokens: 60, overlap_tokens: 0, ..ChunkingConfig::default() });
    let corpus = processor.process_directory(dir);

    assert_eq!(corpus.files_indexed, 2);
    assert_eq!(corpus.source_count(), 2);
    assert!(corpus.chunks.iter().all(|c| c.source != ".hidden.txt"));
    assert_eq!(corpus.chunks[0].source, "a.txt");
    let notes: Vec<usize> = corpus.chunks.iter().filter(|c| c.source == "week1/notes.txt").map(|c| c.ordinal).collect();
    assert!(notes.len() > 1);
    assert_eq!(notes, (0..notes.len()).collect::<Vec<_>>());
}

#[test]
fn unreadable_pdf_is_skipped_not_fatal() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("broken.pdf"), b"not really a pdf").unwrap();
    fs::write(tmp.path().join("ok.txt"), "Fine text.").unwrap();

    let corpus = DataProcessor::default().process_directory(tmp.path());

    assert_eq!(corpus.files_skipped.len(), 1);
    assert_eq!(corpus.chunks.len(), 1);
    assert_eq!(corpus.chunks[0].source, "ok.txt");
}

#[test]
fn missing_directory_is_an_empty_corpus() {
    let tmp = TempDir::new().unwrap();
    let corpus = DataProcessor::default().process_directory(&tmp.path().join("nope"));
    assert!(corpus.chunks.is_empty());
    assert_eq!(corpus.files_indexed, 0);
}

#[test]
fn config_layers_toml_over_defaults() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("config.toml"), "[data]\nindex_dir = \"idx\"\n\n[chunking]\nmax_tokens = 120\n").unwrap();
    fs::write(tmp.path().join("config.test.toml"), "[quiz]\nenrich = true\n").unwrap();

    let config = Config::load_from(tmp.path(), "test").expect("config");
    let settings = config.settings().expect("settings");

    assert_eq!(settings.chunking.max_tokens, 120);
    assert_eq!(settings.chunking.overlap_tokens, 50);
    assert!(settings.quiz.enrich);
    assert_eq!(settings.answer.k, 8);
    assert_eq!(settings.index_dir(config.base_dir()), tmp.path().join("idx"));
    assert_eq!(config.get::<String>("embedding.model").expect("model"), "text-embedding-3-large");
}

#[test]
fn config_rejects_zero_batch_size() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("config.toml"), "[embedding]\nbatch_size = 0\n").unwrap();
    assert!(Config::load_from(tmp.path(), "dev").is_err());
}
