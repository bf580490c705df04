//! Sentence-boundary text chunker.
//!
//! Splits extracted document text into chunks bounded by a configurable
//! word budget. Sentences are accumulated greedily; when the next sentence
//! would exceed the budget, the chunk is closed and the next one is seeded
//! with the trailing `overlap_words` words of the one just closed, so
//! neighboring chunks share context at the word level.
//!
//! The function is pure: identical input and parameters always produce the
//! identical chunk sequence.

/// Chunks shorter than this many characters are dropped as degenerate.
pub const MIN_CHUNK_CHARS: usize = 10;

/// Split `text` into chunks of at most `max_words` words with
/// `overlap_words` words carried between consecutive chunks.
///
/// A single sentence longer than `max_words` still becomes its own chunk —
/// it is never truncated. Empty input yields an empty vec.
pub fn chunk_text(text: &str, max_words: usize, overlap_words: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    if text.trim().is_empty() || max_words == 0 {
        return chunks;
    }

    // Running chunk, kept as individual words so the overlap carry is
    // word-level rather than sentence-level.
    let mut current: Vec<String> = Vec::new();

    for sentence in split_sentences(text) {
        let words: Vec<&str> = sentence.split_whitespace().collect();
        if words.is_empty() {
            continue;
        }

        if !current.is_empty() && current.len() + words.len() > max_words {
            flush(&mut chunks, &current);
            // Seed the next chunk with the tail of the closed one. The
            // carry is capped so a sentence that fits on its own is never
            // pushed past the budget; an oversized sentence gets no carry
            // and stands alone.
            let carry = overlap_words.min(max_words.saturating_sub(words.len().min(max_words)));
            let tail_start = current.len() - carry.min(current.len());
            current = current.split_off(tail_start);
        }

        current.extend(words.iter().map(|w| w.to_string()));
    }

    flush(&mut chunks, &current);
    chunks
}

fn flush(chunks: &mut Vec<String>, words: &[String]) {
    if words.is_empty() {
        return;
    }
    let text = words.join(" ");
    if text.len() >= MIN_CHUNK_CHARS {
        chunks.push(text);
    }
}

/// Heuristic sentence splitter: a sentence ends at `.`, `!`, or `?`
/// followed by whitespace (or end of input), or at a newline. No tokenizer
/// dependency; good enough for prose, and paginated formats arrive here
/// one logical unit at a time anyway.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let bytes = text.as_bytes();
    let mut start = 0;

    let mut iter = text.char_indices().peekable();
    while let Some((i, c)) = iter.next() {
        let at_boundary = match c {
            '.' | '!' | '?' => match iter.peek() {
                Some((_, next)) => next.is_whitespace(),
                None => true,
            },
            '\n' => true,
            _ => false,
        };

        if at_boundary {
            let end = i + c.len_utf8();
            let sentence = text[start..end].trim();
            if !sentence.is_empty() {
                sentences.push(sentence);
            }
            start = end;
        }
    }

    if start < bytes.len() {
        let sentence = text[start..].trim();
        if !sentence.is_empty() {
            sentences.push(sentence);
        }
    }

    sentences
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_yields_no_chunks() {
        assert!(chunk_text("", 200, 50).is_empty());
        assert!(chunk_text("   \n\t ", 200, 50).is_empty());
    }

    #[test]
    fn short_text_is_one_chunk() {
        let text = "The quick brown fox jumps. It lands on the lazy dog. Everyone claps.";
        let chunks = chunk_text(text, 200, 50);
        assert_eq!(chunks.len(), 1);
        assert_eq!(
            chunks[0],
            "The quick brown fox jumps. It lands on the lazy dog. Everyone claps."
        );
    }

    #[test]
    fn chunks_respect_word_budget() {
        let text = (0..40)
            .map(|i| format!("Sentence number {i} has exactly six words."))
            .collect::<Vec<_>>()
            .join(" ");
        let chunks = chunk_text(&text, 20, 5);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(
                chunk.split_whitespace().count() <= 20,
                "chunk over budget: {chunk}"
            );
        }
    }

    #[test]
    fn oversized_sentence_becomes_its_own_chunk() {
        let long: String = (0..30).map(|i| format!("word{i} ")).collect();
        let text = format!("Short lead. {} Trailing bit.", long.trim());
        let chunks = chunk_text(&text, 10, 3);
        // The 30-word sentence must appear somewhere, untruncated.
        assert!(chunks
            .iter()
            .any(|c| c.split_whitespace().count() >= 30));
    }

    #[test]
    fn overlap_carries_trailing_words() {
        let text = (0..10)
            .map(|i| format!("Sentence {i} carries five words total."))
            .collect::<Vec<_>>()
            .join(" ");
        let chunks = chunk_text(&text, 12, 4);
        assert!(chunks.len() > 1);
        for pair in chunks.windows(2) {
            let prev: Vec<&str> = pair[0].split_whitespace().collect();
            let tail = &prev[prev.len() - 4..];
            let next_words: Vec<&str> = pair[1].split_whitespace().collect();
            assert_eq!(&next_words[..4], tail, "overlap not carried");
        }
    }

    #[test]
    fn word_sequence_is_reconstructible() {
        let text = (0..25)
            .map(|i| format!("Alpha beta gamma delta item {i}."))
            .collect::<Vec<_>>()
            .join(" ");
        let original: Vec<&str> = text.split_whitespace().collect();

        let overlap = 4;
        let chunks = chunk_text(&text, 15, overlap);
        let mut rebuilt: Vec<String> = Vec::new();
        for (i, chunk) in chunks.iter().enumerate() {
            let words: Vec<&str> = chunk.split_whitespace().collect();
            let skip = if i == 0 { 0 } else { overlap };
            rebuilt.extend(words[skip..].iter().map(|w| w.to_string()));
        }
        assert_eq!(rebuilt, original);
    }

    #[test]
    fn tiny_chunks_are_dropped() {
        // Each sentence is under the 10-char floor and also alone per chunk.
        let chunks = chunk_text("Hi. Ok. No.", 1, 0);
        assert!(chunks.is_empty());
    }

    #[test]
    fn deterministic_across_calls() {
        let text = "One two three. Four five six. Seven eight nine. Ten eleven twelve.";
        let a = chunk_text(text, 6, 2);
        let b = chunk_text(text, 6, 2);
        assert_eq!(a, b);
    }

    #[test]
    fn sentence_splitter_handles_terminators_and_newlines() {
        let parts = split_sentences("First one. Second one!\nThird line\nFourth? Yes.");
        assert_eq!(
            parts,
            vec!["First one.", "Second one!", "Third line", "Fourth?", "Yes."]
        );
    }

    #[test]
    fn sentence_splitter_ignores_inline_dots() {
        let parts = split_sentences("Version 1.2.3 shipped today. It works.");
        assert_eq!(parts, vec!["Version 1.2.3 shipped today.", "It works."]);
    }
}
