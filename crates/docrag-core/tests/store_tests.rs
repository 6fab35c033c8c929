use std::fs;
use tempfile::TempDir;

use docrag_core::chunker::{chunk, BoundaryPolicy};
use docrag_core::config::ChunkingSettings;
use docrag_core::error::Error;
use docrag_core::export::{build_collection, export_jsonl};
use docrag_core::store::{sanitize_name, ChunkStore};
use docrag_core::types::{Chunk, DocumentMeta};

fn chunks_for(source: &str, text: &str) -> Vec<Chunk> {
    let settings = ChunkingSettings { chunk_size: 40, overlap: 10, boundary: BoundaryPolicy::Sentence };
    chunk(text, &DocumentMeta::new(source).with_title("t"), settings).unwrap()
}

#[test]
fn save_load_roundtrip_preserves_order() {
    let tmp = TempDir::new().unwrap();
    let store = ChunkStore::open(tmp.path()).unwrap();
    let chunks = chunks_for("Manual v2.pdf", "One sentence here. Two sentences here. Three sentences here.");
    assert!(chunks.len() > 1);

    assert!(!store.exists("Manual v2.pdf"));
    store.save("Manual v2.pdf", &chunks).unwrap();
    assert!(store.exists("Manual v2.pdf"));
    assert_eq!(store.path_for("Manual v2.pdf").file_name().unwrap(), "Manual_v2.pdf_chunks.json");
    assert_eq!(store.load("Manual v2.pdf").unwrap(), chunks);
}

#[test]
fn save_replaces_previous_chunk_set() {
    let tmp = TempDir::new().unwrap();
    let store = ChunkStore::open(tmp.path()).unwrap();
    store.save("a", &chunks_for("a", "First version. With two sentences in it.")).unwrap();
    let replacement = chunks_for("a", "Second.");
    store.save("a", &replacement).unwrap();
    assert_eq!(store.load("a").unwrap(), replacement);
}

#[test]
fn save_rejects_inconsistent_chunk_lists() {
    let tmp = TempDir::new().unwrap();
    let store = ChunkStore::open(tmp.path()).unwrap();
    let mut chunks = chunks_for("a", "One sentence here. Two sentences here. Three sentences here.");
    chunks.swap(0, 1);
    assert!(matches!(store.save("a", &chunks), Err(Error::Operation(_))));
    assert!(matches!(store.save("b", &chunks_for("a", "Text.")), Err(Error::Operation(_))));
    assert!(!store.exists("a"));
}

#[test]
fn load_missing_source_is_not_found() {
    let tmp = TempDir::new().unwrap();
    let store = ChunkStore::open(tmp.path()).unwrap();
    assert!(matches!(store.load("nope"), Err(Error::NotFound(_))));
}

#[test]
fn load_all_skips_malformed_files() {
    let tmp = TempDir::new().unwrap();
    let store = ChunkStore::open(tmp.path()).unwrap();
    store.save("b", &chunks_for("b", "Bravo.")).unwrap();
    store.save("a", &chunks_for("a", "Alpha.")).unwrap();
    fs::write(tmp.path().join("broken_chunks.json"), "{ not json").unwrap();
    fs::write(
        tmp.path().join("gappy_chunks.json"),
        r#"[{"text":"x","metadata":{"source":"g","chunk_index":1,"total_chunks":1}}]"#,
    )
    .unwrap();
    fs::write(tmp.path().join("notes.json"), "[]").unwrap();

    let report = store.load_all().unwrap();
    let sources: Vec<&str> = report.chunks.iter().map(|c| c.metadata.source.as_str()).collect();
    assert_eq!(sources, vec!["a", "b"], "file-name order, bad files skipped");
    assert_eq!(report.failures.len(), 2);
    assert!(report.failures.iter().any(|f| f.path.ends_with("broken_chunks.json")));
    assert!(report.failures.iter().any(|f| f.path.ends_with("gappy_chunks.json") && f.reason.contains("chunk_index")));
    assert_eq!(store.sources().unwrap(), vec!["a".to_string(), "b".to_string()]);
}

#[test]
fn unknown_metadata_keys_survive_a_roundtrip() {
    let tmp = TempDir::new().unwrap();
    let store = ChunkStore::open(tmp.path()).unwrap();
    fs::write(
        tmp.path().join("x_chunks.json"),
        r#"[{"text":"hi","metadata":{"source":"x","chunk_index":0,"total_chunks":1,"page":7}}]"#,
    )
    .unwrap();
    let chunks = store.load("x").unwrap();
    assert_eq!(chunks[0].metadata.extra.get("page"), Some(&serde_json::json!(7)));
    store.save("x", &chunks).unwrap();
    assert_eq!(store.load("x").unwrap(), chunks);
}

#[test]
fn remove_deletes_the_source() {
    let tmp = TempDir::new().unwrap();
    let store = ChunkStore::open(tmp.path()).unwrap();
    store.save("a", &chunks_for("a", "Alpha.")).unwrap();
    assert!(store.remove("a").unwrap());
    assert!(!store.remove("a").unwrap());
    assert!(store.load_all().unwrap().chunks.is_empty());
}

#[test]
fn sanitize_replaces_path_unsafe_characters() {
    assert_eq!(sanitize_name("a/b:c d.pdf"), "a_b_c_d.pdf");
    assert_eq!(sanitize_name("ok-name_1.txt"), "ok-name_1.txt");
}

#[test]
fn exports_are_grouped_and_stable() {
    let tmp = TempDir::new().unwrap();
    let mut chunks = chunks_for("a", "One sentence here. Two sentences here. Three sentences here.");
    chunks.extend(chunks_for("b", "Bravo."));

    let out = tmp.path().join("corpus.jsonl");
    assert_eq!(export_jsonl(&chunks, &out).unwrap(), chunks.len());
    let lines: Vec<serde_json::Value> = fs::read_to_string(&out)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(lines.len(), chunks.len());
    assert_eq!(lines[1]["metadata"]["chunk_id"], 1);
    assert_eq!(lines[1]["metadata"]["source"], "a");

    let first = build_collection(&chunks, "KB");
    let second = build_collection(&chunks, "KB");
    assert_eq!(first.documents.len(), 2);
    assert_eq!(first.documents[0].id, second.documents[0].id);
    assert_ne!(first.documents[0].content_chunks[0].id, first.documents[0].content_chunks[1].id);
}
