//! Property tests for chunk coverage and index search ordering.

use docqa_core::chunk::{chunk_text, reassemble, ChunkConfig};
use docqa_core::index::{ShardedIndex, VectorIndex};
use docqa_core::models::EntryMetadata;
use proptest::prelude::*;

/// A chunk config with `overlap_size < max_chunk_size`.
fn arb_config() -> impl Strategy<Value = ChunkConfig> {
    (1usize..120)
        .prop_flat_map(|max| (Just(max), 0..max, 0usize..80))
        .prop_map(|(max, overlap, window)| {
            ChunkConfig::new(max, overlap)
                .unwrap()
                .with_boundary_window(window)
        })
}

/// Text mixing multibyte chars with paragraph and sentence breaks.
fn arb_text() -> impl Strategy<Value = String> {
    "[a-zé漢 .!?\n]{0,400}"
}

/// A vector with at least one clearly non-zero component.
fn arb_vector(dim: usize) -> impl Strategy<Value = Vec<f32>> {
    proptest::collection::vec(-1.0f32..1.0f32, dim)
        .prop_filter("non-zero vector", |v| v.iter().any(|x| x.abs() > 1e-3))
}

mod prop_chunk_coverage {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn chunks_cover_text_with_exact_overlap(text in arb_text(), config in arb_config()) {
            let chunks = chunk_text("doc", &text, &config).unwrap();
            let total = text.chars().count();

            prop_assert!(!chunks.is_empty());
            prop_assert_eq!(chunks[0].start, 0);
            prop_assert_eq!(chunks.last().unwrap().end, total);
            for (i, chunk) in chunks.iter().enumerate() {
                prop_assert_eq!(chunk.chunk_index, i);
                prop_assert!(chunk.len() <= config.max_chunk_size);
                prop_assert_eq!(chunk.text.chars().count(), chunk.len());
            }
            for pair in chunks.windows(2) {
                prop_assert_eq!(pair[1].start, pair[0].end - config.overlap_size);
                prop_assert!(pair[1].end > pair[0].end);
            }
            prop_assert_eq!(reassemble(&chunks, config.overlap_size), text);
        }

        #[test]
        fn chunk_boundaries_are_deterministic(text in arb_text(), config in arb_config()) {
            let spans = |text: &str| -> Vec<(usize, usize)> {
                chunk_text("doc", text, &config)
                    .unwrap()
                    .iter()
                    .map(|c| (c.start, c.end))
                    .collect()
            };
            prop_assert_eq!(spans(&text), spans(&text));
        }
    }
}

mod prop_index_search {
    use super::*;

    const DIM: usize = 8;

    fn build(vectors: &[Vec<f32>]) -> ShardedIndex {
        let index = ShardedIndex::with_shards(DIM, 4).unwrap();
        for (i, v) in vectors.iter().enumerate() {
            // Every third entry repeats an earlier vector to force ties.
            let v = if i % 3 == 2 { &vectors[i - 1] } else { v };
            let meta = EntryMetadata {
                document_id: format!("d{}", i % 4),
                title: String::new(),
            };
            index.upsert(&format!("c{i:03}"), v, meta).unwrap();
        }
        index
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn results_ordered_and_bounded(
            vectors in proptest::collection::vec(arb_vector(DIM), 0..30),
            query in arb_vector(DIM),
            k in 0usize..40,
        ) {
            let index = build(&vectors);
            let hits = index.search(&query, k).unwrap();

            prop_assert_eq!(hits.len(), k.min(vectors.len()));
            for pair in hits.windows(2) {
                prop_assert!(pair[0].score >= pair[1].score);
                if pair[0].score == pair[1].score {
                    prop_assert!(pair[0].chunk_id < pair[1].chunk_id);
                }
            }
        }

        #[test]
        fn smaller_k_is_a_prefix_of_larger_k(
            vectors in proptest::collection::vec(arb_vector(DIM), 1..30),
            query in arb_vector(DIM),
            k in 1usize..30,
        ) {
            let index = build(&vectors);
            let small: Vec<String> = index
                .search(&query, k)
                .unwrap()
                .into_iter()
                .map(|h| h.chunk_id)
                .collect();
            let large: Vec<String> = index
                .search(&query, k + 5)
                .unwrap()
                .into_iter()
                .map(|h| h.chunk_id)
                .collect();
            prop_assert_eq!(&large[..small.len()], &small[..]);
        }
    }
}
