/// Split text into windows of `chunk_chars` characters overlapping by `overlap_chars`.
/// Whitespace-only windows are dropped.
pub fn chunk_with_overlap(content: &str, chunk_chars: usize, overlap_chars: usize) -> Vec<String> {
    if chunk_chars == 0 {
        return Vec::new();
    }

    let chars: Vec<char> = content.chars().collect();
    let overlap = overlap_chars.min(chunk_chars - 1);
    let step = chunk_chars - overlap;

    let mut chunks = Vec::new();
    let mut start = 0usize;
    while start < chars.len() {
        let end = (start + chunk_chars).min(chars.len());
        let chunk: String = chars[start..end].iter().collect();
        if !chunk.trim().is_empty() {
            chunks.push(chunk);
        }

        if end == chars.len() {
            break;
        }
        start += step;
    }

    chunks
}

/// Collapse the ragged whitespace PDF extraction leaves behind, keeping paragraph breaks.
pub fn normalize_extracted_text(raw: &str) -> String {
    raw.split("\n\n")
        .map(|para| para.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|para| !para.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}
