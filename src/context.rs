//! Assembly of retrieved chunks into a token-budgeted prompt context.
//!
//! Token counts are approximated at 4 characters per token, which is close
//! enough for budget enforcement without pulling in a tokenizer. Chunks are
//! atomic: a chunk is either included whole or dropped, never split — except
//! when not even the first chunk fits, in which case a raw character prefix
//! of it is taken so the model still sees something.

/// Appended whenever chunks were dropped or sliced to fit the budget.
pub const TRUNCATION_NOTICE: &str = "\n\n[Note: Some context was truncated to fit token limits]";

/// Approximate characters per token.
const CHARS_PER_TOKEN: usize = 4;

/// Join `chunks` with blank lines while staying within `max_tokens`.
///
/// Accumulation stops at the first chunk that would exceed the character
/// budget; that chunk and everything after it are dropped. Output is empty
/// only when `chunks` is empty.
pub fn assemble_context(chunks: &[String], max_tokens: usize) -> String {
    if chunks.is_empty() {
        return String::new();
    }

    let char_budget = max_tokens * CHARS_PER_TOKEN;
    let mut assembled = String::new();
    let mut used = 0;
    let mut truncated = false;

    for chunk in chunks {
        if used + chunk.len() <= char_budget {
            if !assembled.is_empty() {
                assembled.push_str("\n\n");
            }
            assembled.push_str(chunk);
            used += chunk.len() + 2;
        } else {
            truncated = true;
            break;
        }
    }

    // Not even the first chunk fit: fall back to a raw prefix of it.
    if assembled.is_empty() {
        let first = &chunks[0];
        let mut cut = char_budget.min(first.len());
        while !first.is_char_boundary(cut) {
            cut -= 1;
        }
        assembled.push_str(&first[..cut]);
        truncated = true;
    }

    if truncated {
        assembled.push_str(TRUNCATION_NOTICE);
    }

    assembled
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn everything_fits_without_notice() {
        let chunks = vec!["alpha".to_string(), "beta".to_string()];
        let out = assemble_context(&chunks, 100);
        assert_eq!(out, "alpha\n\nbeta");
    }

    #[test]
    fn overflowing_chunk_and_successors_are_dropped() {
        let chunks = vec![
            "a".repeat(30),
            "b".repeat(30),
            "c".repeat(5), // would fit, but follows the dropped chunk
        ];
        let out = assemble_context(&chunks, 10); // 40-char budget
        assert!(out.starts_with(&"a".repeat(30)));
        assert!(!out.contains('b'));
        assert!(!out.contains('c'));
        assert!(out.ends_with(TRUNCATION_NOTICE));
    }

    #[test]
    fn oversized_first_chunk_is_sliced_to_a_prefix() {
        let chunks = vec!["A".repeat(10_000)];
        let out = assemble_context(&chunks, 10);
        assert_eq!(out, format!("{}{}", "A".repeat(40), TRUNCATION_NOTICE));
    }

    #[test]
    fn output_is_bounded_by_budget_plus_notice() {
        let chunks: Vec<String> = (0..50).map(|i| format!("chunk number {i}")).collect();
        let max_tokens = 20;
        let out = assemble_context(&chunks, max_tokens);
        assert!(out.len() <= max_tokens * 4 + TRUNCATION_NOTICE.len() + 2);
    }

    #[test]
    fn empty_input_gives_empty_output() {
        assert_eq!(assemble_context(&[], 100), "");
    }

    #[test]
    fn prefix_slice_respects_char_boundaries() {
        // 2-byte characters; a 40-byte budget must not cut one in half
        let chunks = vec!["é".repeat(100)];
        let out = assemble_context(&chunks, 10);
        assert!(out.starts_with(&"é".repeat(20)));
        assert!(out.ends_with(TRUNCATION_NOTICE));
    }
}
