use docuchat_core::types::Chunk;

/// Emitted instead of an empty context so the generator can say it found nothing.
pub const NO_CONTEXT: &str = "No relevant material was found in the indexed documents.";

pub const DEFAULT_SEPARATOR: &str = "\n\n---\n\n";

/// Packs chunks into a bounded block of text.
///
/// Chunks are added whole, in order, until the next one would overflow
/// `max_length` (counted in characters). The separator is only charged
/// between chunks; a provenance tag counts toward its chunk.
#[derive(Debug, Clone)]
pub struct ContextAssembler {
    separator: String,
    provenance: bool,
}

impl Default for ContextAssembler {
    fn default() -> Self { Self { separator: DEFAULT_SEPARATOR.to_string(), provenance: true } }
}

impl ContextAssembler {
    /// Plain chunk texts joined by `separator`, without provenance tags.
    pub fn new(separator: impl Into<String>) -> Self { Self { separator: separator.into(), provenance: false } }

    pub fn with_provenance(mut self, on: bool) -> Self {
        self.provenance = on;
        self
    }

    pub fn assemble(&self, chunks: &[Chunk], max_length: usize) -> String {
        let sep_len = self.separator.chars().count();
        let mut out = String::new();
        let mut used = 0usize;
        let mut included = 0usize;

        for chunk in chunks {
            let block = self.block(chunk);
            let cost = block.chars().count() + if included > 0 { sep_len } else { 0 };
            if used + cost > max_length { break; }
            if included > 0 { out.push_str(&self.separator); }
            out.push_str(&block);
            used += cost;
            included += 1;
        }

        tracing::debug!(offered = chunks.len(), included, chars = used, max_length, "context assembled");
        if included == 0 { return NO_CONTEXT.to_string(); }
        out
    }

    fn block(&self, chunk: &Chunk) -> String {
        if self.provenance {
            format!("[{}#{}]\n{}", chunk.document_id, chunk.id, chunk.text)
        } else {
            chunk.text.clone()
        }
    }
}
