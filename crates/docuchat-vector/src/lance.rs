use anyhow::{anyhow, Result as AnyResult};
use arrow_array::cast::AsArray;
use arrow_array::{Array, FixedSizeListArray, Float32Array, RecordBatch, RecordBatchIterator, StringArray};
use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase, Select};
use lancedb::{Connection, DistanceType};
use std::collections::HashMap;
use std::sync::Arc;

use docuchat_core::error::{Error, Result};
use docuchat_core::traits::VectorIndex;
use docuchat_core::types::{Chunk, ChunkId, IndexHit, Meta};

use crate::schema::build_chunk_schema;
use crate::table::{open_db, sql_literal, table_exists};

/// Chunk store backed by a LanceDB table, searched by cosine distance.
///
/// The table is created on first insert. Scores are `1 - cosine distance`.
pub struct LanceIndex { db: Connection, table_name: String, dim: usize }

impl LanceIndex {
    pub async fn open(uri: &str, table_name: &str, dim: usize) -> AnyResult<Self> {
        let db = open_db(uri).await?;
        tracing::debug!(uri, table = table_name, dim, "opened LanceDB");
        Ok(Self { db, table_name: table_name.to_string(), dim })
    }

    async fn upsert(&self, chunks: &[Chunk]) -> AnyResult<()> {
        if chunks.is_empty() { return Ok(()); }
        let batch = self.chunks_to_record_batch(chunks)?;
        let schema = batch.schema();
        let reader = Box::new(RecordBatchIterator::new(vec![Ok(batch)].into_iter(), schema));
        if table_exists(&self.db, &self.table_name).await? {
            let t = self.db.open_table(&self.table_name).execute().await?;
            let mut mi = t.merge_insert(&["id"]);
            mi.when_matched_update_all(None).when_not_matched_insert_all();
            let _ = mi.execute(reader).await?;
        } else {
            self.db.create_table(&self.table_name, reader).execute().await?;
        }
        Ok(())
    }

    fn chunks_to_record_batch(&self, chunks: &[Chunk]) -> AnyResult<RecordBatch> {
        let mut ids = Vec::with_capacity(chunks.len());
        let mut document_ids = Vec::with_capacity(chunks.len());
        let mut contents = Vec::with_capacity(chunks.len());
        let mut metadata = Vec::with_capacity(chunks.len());
        let mut vectors: Vec<Option<Vec<Option<f32>>>> = Vec::with_capacity(chunks.len());
        for c in chunks {
            if c.embedding.len() != self.dim {
                return Err(anyhow!("chunk {} has dimension {}, table expects {}", c.id, c.embedding.len(), self.dim));
            }
            ids.push(c.id.clone());
            document_ids.push(c.document_id.clone());
            contents.push(c.text.clone());
            metadata.push(serde_json::to_string(&c.metadata)?);
            vectors.push(Some(c.embedding.iter().map(|&x| Some(x)).collect()));
        }
        let dim = i32::try_from(self.dim)?;
        Ok(RecordBatch::try_new(build_chunk_schema(dim), vec![
            Arc::new(StringArray::from(ids)),
            Arc::new(StringArray::from(document_ids)),
            Arc::new(StringArray::from(contents)),
            Arc::new(StringArray::from(metadata)),
            Arc::new(FixedSizeListArray::from_iter_primitive::<arrow_array::types::Float32Type, _, _>(vectors.into_iter(), dim)),
        ])?)
    }

    async fn search(&self, query: &[f32], k: usize, threshold: Option<f32>) -> AnyResult<Vec<IndexHit>> {
        if !table_exists(&self.db, &self.table_name).await? { return Ok(Vec::new()); }
        let table = self.db.open_table(&self.table_name).execute().await?;
        let mut stream = table
            .vector_search(query.to_vec())?
            .distance_type(DistanceType::Cosine)
            .select(Select::columns(&["id"]))
            .limit(k)
            .execute()
            .await?;
        let mut hits = Vec::new();
        while let Some(batch) = stream.try_next().await? {
            let ids = string_column(&batch, "id")?;
            let distances = batch
                .column_by_name("_distance")
                .and_then(|c| c.as_any().downcast_ref::<Float32Array>())
                .ok_or_else(|| anyhow!("_distance column missing"))?;
            for i in 0..batch.num_rows() {
                let score = 1.0 - distances.value(i);
                if threshold.map_or(true, |t| score >= t) {
                    hits.push(IndexHit { id: ids.value(i).to_string(), score });
                }
            }
        }
        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        Ok(hits)
    }

    async fn load(&self, ids: &[ChunkId]) -> AnyResult<Vec<Chunk>> {
        if ids.is_empty() || !table_exists(&self.db, &self.table_name).await? { return Ok(Vec::new()); }
        let table = self.db.open_table(&self.table_name).execute().await?;
        let predicate = format!("id IN ({})", ids.iter().map(|id| sql_literal(id)).collect::<Vec<_>>().join(", "));
        let mut stream = table.query().only_if(predicate).execute().await?;
        let mut by_id: HashMap<String, Chunk> = HashMap::new();
        while let Some(batch) = stream.try_next().await? {
            for chunk in batch_to_chunks(&batch)? { by_id.insert(chunk.id.clone(), chunk); }
        }
        Ok(ids.iter().filter_map(|id| by_id.remove(id)).collect())
    }
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> AnyResult<&'a StringArray> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<StringArray>())
        .ok_or_else(|| anyhow!("{name} column missing"))
}

fn batch_to_chunks(batch: &RecordBatch) -> AnyResult<Vec<Chunk>> {
    let ids = string_column(batch, "id")?;
    let document_ids = string_column(batch, "document_id")?;
    let contents = string_column(batch, "content")?;
    let metadata = string_column(batch, "metadata")?;
    let vectors = batch
        .column_by_name("vector")
        .and_then(|c| c.as_any().downcast_ref::<FixedSizeListArray>())
        .ok_or_else(|| anyhow!("vector column missing"))?;
    let mut out = Vec::with_capacity(batch.num_rows());
    for i in 0..batch.num_rows() {
        let embedding = if vectors.is_valid(i) {
            vectors.value(i).as_primitive::<arrow_array::types::Float32Type>().values().to_vec()
        } else {
            Vec::new()
        };
        let meta: Meta = serde_json::from_str(metadata.value(i))?;
        out.push(Chunk {
            id: ids.value(i).to_string(),
            document_id: document_ids.value(i).to_string(),
            text: contents.value(i).to_string(),
            embedding,
            metadata: meta,
        });
    }
    Ok(out)
}

#[async_trait]
impl VectorIndex for LanceIndex {
    async fn insert(&self, chunks: &[Chunk]) -> Result<()> {
        self.upsert(chunks).await.map_err(|e| Error::index_unavailable(format!("{e:#}")))
    }

    async fn top_k(&self, query: &[f32], k: usize, threshold: Option<f32>) -> Result<Vec<IndexHit>> {
        self.search(query, k, threshold).await.map_err(|e| Error::index_unavailable(format!("{e:#}")))
    }

    async fn fetch(&self, ids: &[ChunkId]) -> Result<Vec<Chunk>> {
        self.load(ids).await.map_err(|e| Error::index_unavailable(format!("{e:#}")))
    }
}
