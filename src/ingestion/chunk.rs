//! Fixed-size overlapping character chunking.
//!
//! [`split_document`] is a pure function of its inputs: the same document
//! and parameters always produce the same chunks. Spans are expressed in
//! character offsets, cover the whole document with no gaps, and consecutive
//! chunks overlap by exactly `chunk_overlap` characters (the final chunk may
//! be shorter).

use url::Url;

use crate::ingestion::fetch::Document;
use crate::types::RagError;

/// A contiguous slice of a document's text, the unit of retrieval.
#[derive(Clone, Debug)]
pub struct Chunk {
    pub text: String,
    pub source_url: Url,
    /// Zero-based position of this chunk within its source document.
    pub chunk_index: usize,
    /// Span start, in characters from the beginning of the document.
    pub char_start: usize,
    /// Span end (exclusive), in characters.
    pub char_end: usize,
}

impl Chunk {
    /// Stable record identity derived from `(source_url, chunk_index)`.
    ///
    /// Re-ingesting the same source produces the same ids, so the vector
    /// index overwrites prior entries instead of accumulating duplicates.
    pub fn record_id(&self) -> String {
        format!("{}#{}", self.source_url, self.chunk_index)
    }

    /// Span length in characters.
    pub fn char_len(&self) -> usize {
        self.char_end - self.char_start
    }
}

/// Splits a document into overlapping character windows.
///
/// Fails with a configuration error when `chunk_size` is zero or
/// `chunk_overlap >= chunk_size`, checked here as well as in
/// [`crate::config::RagConfig::validate`] so the function stands on its own.
/// An empty document yields no chunks.
pub fn split_document(
    document: &Document,
    chunk_size: usize,
    chunk_overlap: usize,
) -> Result<Vec<Chunk>, RagError> {
    if chunk_size == 0 {
        return Err(RagError::Config(
            "chunk_size must be greater than zero".to_string(),
        ));
    }
    if chunk_overlap >= chunk_size {
        return Err(RagError::Config(format!(
            "chunk_overlap ({chunk_overlap}) must be smaller than chunk_size ({chunk_size})"
        )));
    }

    let text = document.text.as_str();
    // Byte offset of every character, so spans slice on char boundaries.
    let char_offsets: Vec<usize> = text.char_indices().map(|(offset, _)| offset).collect();
    let total_chars = char_offsets.len();

    let mut chunks = Vec::new();
    if total_chars == 0 {
        return Ok(chunks);
    }

    let step = chunk_size - chunk_overlap;
    let mut start = 0usize;
    let mut index = 0usize;
    loop {
        let end = (start + chunk_size).min(total_chars);
        let byte_start = char_offsets[start];
        let byte_end = if end == total_chars {
            text.len()
        } else {
            char_offsets[end]
        };
        chunks.push(Chunk {
            text: text[byte_start..byte_end].to_string(),
            source_url: document.url.clone(),
            chunk_index: index,
            char_start: start,
            char_end: end,
        });
        if end == total_chars {
            break;
        }
        start += step;
        index += 1;
    }

    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(text: &str) -> Document {
        Document::new(Url::parse("https://example.com/page").unwrap(), 0, text)
    }

    #[test]
    fn spans_cover_document_with_exact_overlap() {
        let document = doc(&"a".repeat(2500));
        let chunks = split_document(&document, 1000, 200).unwrap();

        let spans: Vec<(usize, usize)> = chunks
            .iter()
            .map(|chunk| (chunk.char_start, chunk.char_end))
            .collect();
        assert_eq!(spans, vec![(0, 1000), (800, 1800), (1600, 2500)]);

        for window in chunks.windows(2) {
            assert_eq!(window[0].char_end - window[1].char_start, 200);
        }
        assert_eq!(chunks.first().unwrap().char_start, 0);
        assert_eq!(chunks.last().unwrap().char_end, 2500);
    }

    #[test]
    fn chunk_indexes_are_sequential() {
        let document = doc(&"b".repeat(5000));
        let chunks = split_document(&document, 1000, 100).unwrap();
        for (expected, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.chunk_index, expected);
        }
    }

    #[test]
    fn short_document_yields_single_chunk() {
        let document = doc("short text");
        let chunks = split_document(&document, 1000, 200).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "short text");
        assert_eq!(chunks[0].char_start, 0);
        assert_eq!(chunks[0].char_end, 10);
    }

    #[test]
    fn empty_document_yields_no_chunks() {
        let document = doc("");
        let chunks = split_document(&document, 1000, 200).unwrap();
        assert!(chunks.is_empty());
    }

    #[test]
    fn overlap_at_or_above_chunk_size_is_rejected() {
        let document = doc("irrelevant");
        assert!(matches!(
            split_document(&document, 100, 100),
            Err(RagError::Config(_))
        ));
        assert!(matches!(
            split_document(&document, 100, 250),
            Err(RagError::Config(_))
        ));
    }

    #[test]
    fn multibyte_text_slices_on_char_boundaries() {
        let document = doc(&"é漢🦀".repeat(400));
        let chunks = split_document(&document, 500, 100).unwrap();
        assert!(chunks.len() > 1);
        // Reconstruct the document from non-overlapping prefixes.
        let mut rebuilt = String::new();
        for chunk in &chunks {
            let skip = rebuilt.chars().count() - chunk.char_start;
            rebuilt.extend(chunk.text.chars().skip(skip));
        }
        assert_eq!(rebuilt, document.text);
    }

    #[test]
    fn record_ids_are_stable_across_runs() {
        let document = doc(&"c".repeat(1500));
        let first = split_document(&document, 1000, 200).unwrap();
        let second = split_document(&document, 1000, 200).unwrap();
        let first_ids: Vec<String> = first.iter().map(Chunk::record_id).collect();
        let second_ids: Vec<String> = second.iter().map(Chunk::record_id).collect();
        assert_eq!(first_ids, second_ids);
    }
}
