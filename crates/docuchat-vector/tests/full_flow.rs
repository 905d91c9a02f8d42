use docuchat_core::traits::VectorIndex;
use docuchat_core::types::{Chunk, Meta, MetaValue};
use docuchat_vector::{InMemoryIndex, LanceIndex};
use tempfile::TempDir;

const DIM: usize = 8;

fn axis(i: usize, tilt: f32) -> Vec<f32> {
    let mut v = vec![0.0; DIM];
    v[i % DIM] = 1.0;
    v[(i + 1) % DIM] = tilt;
    v
}

fn corpus() -> Vec<Chunk> {
    (0..6)
        .map(|i| {
            let mut metadata = Meta::new();
            metadata.insert("page".to_string(), MetaValue::Int(i as i64));
            metadata.insert("source".to_string(), MetaValue::Text(format!("doc{}.txt", i / 2)));
            Chunk {
                id: format!("doc{}:{}", i / 2, i),
                document_id: format!("doc{}", i / 2),
                text: format!("chunk number {i}"),
                embedding: axis(i, 0.2),
                metadata,
            }
        })
        .collect()
}

async fn exercise(index: &dyn VectorIndex) {
    let chunks = corpus();
    index.insert(&chunks).await.expect("insert");

    let hits = index.top_k(&axis(2, 0.0), 3, None).await.expect("top_k");
    assert!(!hits.is_empty());
    assert_eq!(hits[0].id, "doc1:2");
    for w in hits.windows(2) { assert!(w[0].score >= w[1].score); }

    let strict = index.top_k(&axis(2, 0.0), 6, Some(0.9)).await.expect("top_k strict");
    assert_eq!(strict.len(), 1, "only the aligned chunk clears 0.9");

    let ids = vec!["doc2:5".to_string(), "missing".to_string(), "doc0:0".to_string()];
    let fetched = index.fetch(&ids).await.expect("fetch");
    assert_eq!(fetched.len(), 2);
    assert_eq!(fetched[0].id, "doc2:5");
    assert_eq!(fetched[1].id, "doc0:0");
    assert_eq!(fetched[0].metadata.get("page"), Some(&MetaValue::Int(5)));
    assert_eq!(fetched[0].embedding.len(), DIM);
}

#[tokio::test]
async fn in_memory_index_full_flow() {
    let index = InMemoryIndex::new();
    exercise(&index).await;
    assert_eq!(index.len(), 6);
}

#[tokio::test]
async fn lance_index_full_flow() {
    let tmp = TempDir::new().expect("tmp");
    let uri = tmp.path().to_string_lossy().to_string();
    let index = LanceIndex::open(&uri, "chunks_test_tmp", DIM).await.expect("open");
    exercise(&index).await;

    // re-insert is an upsert, not a duplicate
    let mut again = corpus();
    again[0].text = "rewritten".to_string();
    index.insert(&again[..1]).await.expect("upsert");
    let fetched = index.fetch(&["doc0:0".to_string()]).await.expect("fetch");
    assert_eq!(fetched.len(), 1);
    assert_eq!(fetched[0].text, "rewritten");
}

#[tokio::test]
async fn lance_index_without_table_is_empty() {
    let tmp = TempDir::new().expect("tmp");
    let uri = tmp.path().to_string_lossy().to_string();
    let index = LanceIndex::open(&uri, "absent", DIM).await.expect("open");
    assert!(index.top_k(&axis(0, 0.0), 5, None).await.expect("top_k").is_empty());
    assert!(index.fetch(&["x".to_string()]).await.expect("fetch").is_empty());
}

#[tokio::test]
async fn first_insert_creates_the_table_for_later_handles() {
    let tmp = TempDir::new().expect("tmp");
    let uri = tmp.path().to_string_lossy().to_string();
    let writer = LanceIndex::open(&uri, "fresh", DIM).await.expect("open");
    writer.insert(&corpus()[..2]).await.expect("insert into missing table");

    let reader = LanceIndex::open(&uri, "fresh", DIM).await.expect("reopen");
    let hits = reader.top_k(&axis(1, 0.0), 1, None).await.expect("top_k");
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id, "doc0:1");
}
