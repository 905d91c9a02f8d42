use async_trait::async_trait;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::RwLock;

use docuchat_core::error::{Error, Result};
use docuchat_core::similarity::{dot, normalized};
use docuchat_core::traits::VectorIndex;
use docuchat_core::types::{Chunk, ChunkId, IndexHit};

#[derive(Default)]
struct Store {
    chunks: Vec<Chunk>,
    /// Unit-length copies of the chunk embeddings, same order as `chunks`.
    unit: Vec<Vec<f32>>,
    positions: HashMap<ChunkId, usize>,
    dim: Option<usize>,
}

/// Exact cosine k-NN over chunks held in memory.
///
/// Hits with equal scores come back in insertion order. Re-inserting an id
/// replaces the stored chunk in place.
#[derive(Default)]
pub struct InMemoryIndex {
    store: RwLock<Store>,
}

impl InMemoryIndex {
    pub fn new() -> Self { Self::default() }

    pub fn len(&self) -> usize { self.store.read().map(|s| s.chunks.len()).unwrap_or(0) }

    pub fn is_empty(&self) -> bool { self.len() == 0 }
}

fn poisoned<T>(_: T) -> Error { Error::index_unavailable("in-memory index lock poisoned") }

#[async_trait]
impl VectorIndex for InMemoryIndex {
    async fn insert(&self, chunks: &[Chunk]) -> Result<()> {
        let mut store = self.store.write().map_err(poisoned)?;
        for chunk in chunks {
            let dim = *store.dim.get_or_insert(chunk.embedding.len());
            if chunk.embedding.len() != dim {
                return Err(Error::index_unavailable(format!(
                    "chunk {} has dimension {}, index expects {}", chunk.id, chunk.embedding.len(), dim
                )));
            }
            let unit = normalized(&chunk.embedding);
            match store.positions.get(&chunk.id).copied() {
                Some(pos) => {
                    store.chunks[pos] = chunk.clone();
                    store.unit[pos] = unit;
                }
                None => {
                    let pos = store.chunks.len();
                    store.positions.insert(chunk.id.clone(), pos);
                    store.chunks.push(chunk.clone());
                    store.unit.push(unit);
                }
            }
        }
        Ok(())
    }

    async fn top_k(&self, query: &[f32], k: usize, threshold: Option<f32>) -> Result<Vec<IndexHit>> {
        let store = self.store.read().map_err(poisoned)?;
        if let Some(dim) = store.dim {
            if query.len() != dim {
                return Err(Error::index_unavailable(format!("query has dimension {}, index expects {}", query.len(), dim)));
            }
        }
        let q = normalized(query);
        let mut scored: Vec<(usize, f32)> = store
            .unit
            .iter()
            .enumerate()
            .map(|(i, v)| (i, dot(&q, v).clamp(-1.0, 1.0)))
            .filter(|(_, s)| threshold.map_or(true, |t| *s >= t))
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
        scored.truncate(k);
        Ok(scored.into_iter().map(|(i, score)| IndexHit { id: store.chunks[i].id.clone(), score }).collect())
    }

    async fn fetch(&self, ids: &[ChunkId]) -> Result<Vec<Chunk>> {
        let store = self.store.read().map_err(poisoned)?;
        Ok(ids.iter().filter_map(|id| store.positions.get(id).map(|&i| store.chunks[i].clone())).collect())
    }
}
