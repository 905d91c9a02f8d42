mod common;

use common::chunk;
use docuchat_core::types::Chunk;
use docuchat_retrieval::context::{ContextAssembler, NO_CONTEXT};

fn sized(id: &str, fill: char, len: usize) -> Chunk { chunk(id, &fill.to_string().repeat(len), vec![0.0; 4]) }

#[test]
fn stops_before_the_chunk_that_would_overflow() {
    let chunks = [sized("a", 'a', 40), sized("b", 'b', 40), sized("c", 'c', 40)];
    let assembler = ContextAssembler::new("\n---\n");

    let out = assembler.assemble(&chunks, 100);
    assert_eq!(out.chars().count(), 85);
    assert_eq!(out, format!("{}\n---\n{}", "a".repeat(40), "b".repeat(40)));
    assert!(!out.contains('c'));
}

#[test]
fn included_chunks_are_never_cut() {
    let chunks: Vec<Chunk> = (0..12).map(|i| sized(&format!("k{i}"), (b'a' + i as u8) as char, 7 + i * 3)).collect();
    let assembler = ContextAssembler::default();
    for max in [0usize, 10, 50, 120, 400, 10_000] {
        let out = assembler.assemble(&chunks, max);
        if out == NO_CONTEXT { continue; }
        assert!(out.chars().count() <= max);
        for part in out.split("\n\n---\n\n") {
            let (_, text) = part.split_once('\n').expect("provenance line");
            assert!(chunks.iter().any(|c| c.text == text), "fragment {text:?} is not a whole chunk");
        }
    }
}

#[test]
fn later_small_chunks_are_not_backfilled() {
    let chunks = [sized("a", 'a', 40), sized("b", 'b', 80), sized("c", 'c', 5)];
    let out = ContextAssembler::new(" | ").assemble(&chunks, 100);
    assert_eq!(out, "a".repeat(40));
}

#[test]
fn empty_input_yields_the_no_context_marker() {
    let assembler = ContextAssembler::default();
    assert_eq!(assembler.assemble(&[], 1000), NO_CONTEXT);
    assert_eq!(assembler.assemble(&[sized("big", 'x', 500)], 100), NO_CONTEXT);
}

#[test]
fn provenance_tags_name_document_and_chunk() {
    let out = ContextAssembler::default().assemble(&[chunk("c1", "body text", vec![0.0; 4])], 1000);
    assert_eq!(out, "[doc-c1#c1]\nbody text");

    let plain = ContextAssembler::default().with_provenance(false).assemble(&[chunk("c1", "body text", vec![0.0; 4])], 1000);
    assert_eq!(plain, "body text");
}

#[test]
fn length_is_counted_in_characters() {
    let chunks = [chunk("u", "héllo wörld", vec![0.0; 4])];
    let out = ContextAssembler::new("").assemble(&chunks, 11);
    assert_eq!(out, "héllo wörld");
}

#[test]
fn assembly_is_deterministic() {
    let chunks = [sized("a", 'a', 30), sized("b", 'b', 30), sized("c", 'c', 30)];
    let assembler = ContextAssembler::default();
    assert_eq!(assembler.assemble(&chunks, 90), assembler.assemble(&chunks, 90));
}
