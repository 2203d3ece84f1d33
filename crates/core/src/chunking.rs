use crate::models::{Chunk, ChunkingOptions};
use crate::PipelineError;
use sha2::{Digest, Sha256};
use std::collections::VecDeque;
use tracing::warn;

const SEPARATOR: char = '\n';
const SEPARATOR_LEN: usize = 1;

pub fn validate_options(options: ChunkingOptions) -> Result<(), PipelineError> {
    if options.chunk_size == 0 {
        return Err(PipelineError::InvalidChunkConfig(
            "chunk_size must be positive".to_string(),
        ));
    }
    if options.overlap >= options.chunk_size {
        return Err(PipelineError::InvalidChunkConfig(format!(
            "overlap {} must be smaller than chunk_size {}",
            options.overlap, options.chunk_size
        )));
    }
    Ok(())
}

/// Splits on newlines and greedily packs lines into chunks of at most
/// `chunk_size` characters. Each chunk after the first starts with the
/// trailing lines of its predecessor, up to `overlap` characters of them.
/// A single line longer than `chunk_size` becomes its own oversized chunk.
pub fn split_text(text: &str, options: ChunkingOptions) -> Result<Vec<String>, PipelineError> {
    validate_options(options)?;

    if text.trim().is_empty() {
        return Ok(Vec::new());
    }

    let splits = text
        .split(SEPARATOR)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>();

    Ok(merge_splits(&splits, options))
}

fn merge_splits(splits: &[&str], options: ChunkingOptions) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current: VecDeque<(&str, usize)> = VecDeque::new();
    let mut total = 0usize;

    for &split in splits {
        let len = split.chars().count();

        if !current.is_empty() && total + len + SEPARATOR_LEN > options.chunk_size {
            if total > options.chunk_size {
                warn!(
                    size = total,
                    limit = options.chunk_size,
                    "emitting chunk longer than chunk_size"
                );
            }
            push_joined(&mut chunks, &current);

            while total > options.overlap
                || (total > 0 && total + len + joiner_len(&current) > options.chunk_size)
            {
                let joiner = if current.len() > 1 { SEPARATOR_LEN } else { 0 };
                let Some((_, first_len)) = current.pop_front() else {
                    break;
                };
                total = total.saturating_sub(first_len + joiner);
            }
        }

        current.push_back((split, len));
        total += len + if current.len() > 1 { SEPARATOR_LEN } else { 0 };
    }

    push_joined(&mut chunks, &current);
    chunks
}

fn joiner_len(current: &VecDeque<(&str, usize)>) -> usize {
    if current.is_empty() {
        0
    } else {
        SEPARATOR_LEN
    }
}

fn push_joined(chunks: &mut Vec<String>, current: &VecDeque<(&str, usize)>) {
    let joined = current
        .iter()
        .map(|(line, _)| *line)
        .collect::<Vec<_>>()
        .join("\n");
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
}

/// Splits `text` and gives every chunk an id that is stable for identical input.
pub fn build_chunks(text: &str, options: ChunkingOptions) -> Result<Vec<Chunk>, PipelineError> {
    let chunks = split_text(text, options)?
        .into_iter()
        .enumerate()
        .map(|(chunk_index, text)| Chunk {
            chunk_id: make_chunk_id(chunk_index, &text),
            chunk_index,
            text,
        })
        .collect();

    Ok(chunks)
}

fn make_chunk_id(index: usize, text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update((index as u64).to_le_bytes());
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(chunk_size: usize, overlap: usize) -> ChunkingOptions {
        ChunkingOptions {
            chunk_size,
            overlap,
        }
    }

    #[test]
    fn blank_input_yields_no_chunks() {
        assert!(split_text("", ChunkingOptions::default()).unwrap().is_empty());
        assert!(split_text(" \n\t\n  ", ChunkingOptions::default())
            .unwrap()
            .is_empty());
    }

    #[test]
    fn overlap_must_be_smaller_than_chunk_size() {
        assert!(matches!(
            split_text("text", options(100, 100)),
            Err(PipelineError::InvalidChunkConfig(_))
        ));
        assert!(matches!(
            split_text("text", options(0, 0)),
            Err(PipelineError::InvalidChunkConfig(_))
        ));
    }

    #[test]
    fn repeated_sentence_splits_into_two_overlapping_chunks() {
        let text = "Paris is the capital of France.\n".repeat(50);
        let chunks = split_text(&text, ChunkingOptions::default()).unwrap();

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].chars().count(), 991);
        assert_eq!(chunks[1].chars().count(), 799);

        let first_lines = chunks[0].lines().count();
        let second_lines = chunks[1].lines().count();
        let shared = first_lines + second_lines - 50;
        assert_eq!(shared, 6);
        assert!(shared * 32 - 1 <= 200);
    }

    #[test]
    fn chunks_respect_size_and_overlap_on_distinct_lines() {
        let text = (0..120)
            .map(|i| format!("line {i:03} carries a short sentence"))
            .collect::<Vec<_>>()
            .join("\n");
        let opts = options(300, 80);
        let chunks = split_text(&text, opts).unwrap();

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= opts.chunk_size);
        }

        for pair in chunks.windows(2) {
            let previous = pair[0].lines().collect::<Vec<_>>();
            let next = pair[1].lines().collect::<Vec<_>>();
            let shared = next
                .iter()
                .take_while(|line| previous.contains(*line))
                .copied()
                .collect::<Vec<_>>();

            assert!(previous.ends_with(&shared));
            assert!(shared.join("\n").chars().count() <= opts.overlap);
        }

        for i in 0..120 {
            let line = format!("line {i:03} carries a short sentence");
            assert!(chunks.iter().any(|chunk| chunk.lines().any(|l| l == line)));
        }
    }

    #[test]
    fn oversized_line_is_kept_whole() {
        let long = "a".repeat(1_500);
        let text = format!("{long}\nshort tail");
        let chunks = split_text(&text, ChunkingOptions::default()).unwrap();

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0], long);
        assert_eq!(chunks[1], "short tail");
    }

    #[test]
    fn chunk_ids_are_stable_across_runs() {
        let text = "Paris is the capital of France.\n".repeat(50);
        let first = build_chunks(&text, ChunkingOptions::default()).unwrap();
        let second = build_chunks(&text, ChunkingOptions::default()).unwrap();

        assert_eq!(first, second);
        assert_ne!(first[0].chunk_id, first[1].chunk_id);
        assert_eq!(first[1].chunk_index, 1);
    }
}
