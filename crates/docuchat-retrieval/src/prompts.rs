//! Prompt builders for hypothesis generation and grounded answering.

pub fn hypothesis(query: &str) -> String {
    format!(
        "Write a short passage that directly answers the question below, in the style of \
         the document it would be found in. Do not mention that the passage is hypothetical.\n\n\
         Question: {query}\n\nPassage:"
    )
}

/// Hypothesis prompt conditioned on the best material found so far.
pub fn contextual_hypothesis(query: &str, context: &str) -> String {
    format!(
        "The excerpts below were retrieved for a question but do not fully answer it. \
         Using their vocabulary and subject matter, write a short passage that would answer \
         the question completely, in the style of the source documents.\n\n\
         Excerpts:\n{context}\n\nQuestion: {query}\n\nPassage:"
    )
}

pub fn answer(query: &str, context: &str) -> String {
    format!(
        "Answer the question using only the context below. If the context does not contain \
         the answer, say so.\n\nContext:\n{context}\n\nQuestion: {query}\n\nAnswer:"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompts_embed_their_inputs() {
        assert!(hypothesis("What is X?").contains("What is X?"));
        let p = contextual_hypothesis("What is X?", "X is a thing");
        assert!(p.contains("X is a thing") && p.contains("What is X?"));
        assert!(answer("q", "ctx").contains("Context:\nctx"));
    }
}
