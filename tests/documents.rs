//! Uploads, sidecar extraction, and index rebuild/reload behavior.

use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

use custom_ai::config::{ChunkingConfig, StoreConfig};
use custom_ai::embedding::{Embedder, HashEmbedder};
use custom_ai::error::Error;
use custom_ai::index::{load_or_build_index, IndexOrigin};
use custom_ai::ingest::ingest;
use custom_ai::store;

/// A PDF with one page per phrase, each drawn in Helvetica.
fn pdf_with_pages(phrases: &[&str]) -> Vec<u8> {
    let streams: Vec<String> = phrases
        .iter()
        .map(|phrase| format!("BT /F1 12 Tf 100 700 Td ({}) Tj ET", phrase))
        .collect();
    pdf_with_streams(&streams)
}

/// A PDF with one page per content stream.
fn pdf_with_streams(streams: &[String]) -> Vec<u8> {
    let n = streams.len();
    // 1: catalog, 2: pages, 3: font, then a (page, content) pair per stream
    let page_id = |i: usize| 4 + 2 * i;
    let content_id = |i: usize| 5 + 2 * i;

    let kids = (0..n)
        .map(|i| format!("{} 0 R", page_id(i)))
        .collect::<Vec<_>>()
        .join(" ");

    let mut objects = vec![
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        format!("<< /Type /Pages /Kids [{}] /Count {} >>", kids, n),
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>"
            .to_string(),
    ];
    for (i, stream) in streams.iter().enumerate() {
        objects.push(format!(
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents {} 0 R \
             /Resources << /Font << /F1 3 0 R >> >> >>",
            content_id(i)
        ));
        objects.push(format!(
            "<< /Length {} >>\nstream\n{}\nendstream",
            stream.len(),
            stream
        ));
    }

    let mut out = Vec::new();
    out.extend_from_slice(b"%PDF-1.4\n");
    let mut offsets = Vec::with_capacity(objects.len());
    for (i, body) in objects.iter().enumerate() {
        offsets.push(out.len());
        out.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", i + 1, body).as_bytes());
    }

    let xref_start = out.len();
    out.extend_from_slice(format!("xref\n0 {}\n", objects.len() + 1).as_bytes());
    out.extend_from_slice(b"0000000000 65535 f \n");
    for offset in offsets {
        out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }
    out.extend_from_slice(
        format!(
            "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
            objects.len() + 1,
            xref_start
        )
        .as_bytes(),
    );
    out
}

fn store_config(dir: &Path) -> StoreConfig {
    StoreConfig {
        documents_dir: dir.to_path_buf(),
        ..StoreConfig::default()
    }
}

fn embedder() -> Arc<dyn Embedder> {
    Arc::new(HashEmbedder::new(256))
}

#[test]
fn pdf_upload_writes_text_sidecar() {
    let tmp = TempDir::new().unwrap();
    let data = tmp.path().join("data");
    let pdf = pdf_with_pages(&["first page phrase", "second page phrase"]);

    let report = ingest(&data, "report.pdf", &pdf).unwrap();

    assert_eq!(std::fs::read(data.join("report.pdf")).unwrap(), pdf);
    let sidecar = report.text_sidecar.clone().unwrap();
    assert_eq!(sidecar, data.join("report.txt"));

    let text = std::fs::read_to_string(&sidecar).unwrap();
    assert_eq!(text, "first page phrase second page phrase");
    assert_eq!(report.text_chars, text.chars().count());
}

#[test]
fn text_pieces_within_one_block_are_space_separated() {
    let tmp = TempDir::new().unwrap();
    let pdf = pdf_with_streams(&[
        "BT /F1 12 Tf 100 700 Td (Hello) Tj 0 -14 Td (World) Tj T* (again) Tj ET".to_string(),
        "BT /F1 12 Tf 100 700 Td [(Fj) -30 (ord)] TJ ET".to_string(),
    ]);

    let report = ingest(tmp.path(), "letter.pdf", &pdf).unwrap();
    let text = std::fs::read_to_string(report.text_sidecar.unwrap()).unwrap();
    assert_eq!(text, "Hello World again Fjord");
}

#[test]
fn broken_pdf_upload_is_extraction_error() {
    let tmp = TempDir::new().unwrap();
    let err = ingest(tmp.path(), "broken.pdf", b"%PDF-1.4 not really").unwrap_err();
    assert!(matches!(err, Error::Extraction(_)));
    assert!(!tmp.path().join("broken.pdf").exists());
    assert!(!tmp.path().join("broken.txt").exists());
}

#[tokio::test]
async fn uploaded_pdf_is_indexed_through_its_sidecar() {
    let tmp = TempDir::new().unwrap();
    let pdf = pdf_with_pages(&["glaciers carve fjords"]);
    ingest(tmp.path(), "geo.pdf", &pdf).unwrap();
    std::fs::write(tmp.path().join("other.txt"), "Volcanoes erupt lava.").unwrap();

    let index = load_or_build_index(
        &store_config(tmp.path()),
        None,
        &ChunkingConfig::default(),
        embedder(),
    )
    .await
    .unwrap();

    let ids: Vec<&str> = index.documents().iter().map(|d| d.id.as_str()).collect();
    assert_eq!(ids, vec!["geo.txt", "other.txt"]);

    let hits = index.retrieve("glaciers fjords", 1).await.unwrap();
    assert_eq!(hits[0].chunk.document_id, "geo.txt");
}

#[tokio::test]
async fn rebuild_without_persistence_sees_new_documents() {
    let tmp = TempDir::new().unwrap();
    let config = store_config(tmp.path());
    let chunking = ChunkingConfig::default();

    std::fs::write(tmp.path().join("a.txt"), "Apples grow on trees.").unwrap();
    let first = load_or_build_index(&config, None, &chunking, embedder())
        .await
        .unwrap();
    let hits = first.retrieve("submarine ocean depth", 1).await.unwrap();
    assert_eq!(hits[0].chunk.document_id, "a.txt");

    std::fs::remove_file(tmp.path().join("a.txt")).unwrap();
    std::fs::write(tmp.path().join("b.txt"), "The submarine dives to ocean depth.").unwrap();
    let second = load_or_build_index(&config, None, &chunking, embedder())
        .await
        .unwrap();
    assert_eq!(second.origin(), IndexOrigin::Built);
    let hits = second.retrieve("submarine ocean depth", 1).await.unwrap();
    assert_eq!(hits[0].chunk.document_id, "b.txt");
    assert_eq!(second.documents().len(), 1);
}

#[tokio::test]
async fn persisted_index_is_reloaded_with_identical_results() {
    let tmp = TempDir::new().unwrap();
    let docs = tmp.path().join("data");
    let persist = tmp.path().join("persist");
    std::fs::create_dir_all(&docs).unwrap();
    std::fs::write(docs.join("sky.txt"), "The sky is blue.").unwrap();
    std::fs::write(docs.join("sea.txt"), "The sea is salty.").unwrap();

    let config = store_config(&docs);
    let chunking = ChunkingConfig::default();

    let first = load_or_build_index(&config, Some(&persist), &chunking, embedder())
        .await
        .unwrap();
    assert_eq!(first.origin(), IndexOrigin::Built);
    assert!(store::is_populated(&persist));

    let second = load_or_build_index(&config, Some(&persist), &chunking, embedder())
        .await
        .unwrap();
    assert_eq!(second.origin(), IndexOrigin::Reloaded);

    for query in ["sky color", "salty sea", "blue"] {
        let a = first.retrieve(query, 2).await.unwrap();
        let b = second.retrieve(query, 2).await.unwrap();
        let a: Vec<_> = a.iter().map(|h| (h.chunk.id.clone(), h.chunk.text.clone())).collect();
        let b: Vec<_> = b.iter().map(|h| (h.chunk.id.clone(), h.chunk.text.clone())).collect();
        assert_eq!(a, b);
    }
}

#[tokio::test]
async fn populated_persist_dir_wins_over_directory_changes() {
    let tmp = TempDir::new().unwrap();
    let docs = tmp.path().join("data");
    let persist = tmp.path().join("persist");
    std::fs::create_dir_all(&docs).unwrap();
    std::fs::write(docs.join("sky.txt"), "The sky is blue.").unwrap();

    let config = store_config(&docs);
    let chunking = ChunkingConfig::default();
    load_or_build_index(&config, Some(&persist), &chunking, embedder())
        .await
        .unwrap();

    std::fs::write(docs.join("sea.txt"), "The sea is salty.").unwrap();
    let reloaded = load_or_build_index(&config, Some(&persist), &chunking, embedder())
        .await
        .unwrap();
    assert_eq!(reloaded.origin(), IndexOrigin::Reloaded);
    assert_eq!(reloaded.documents().len(), 1);
}
