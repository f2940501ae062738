//! Extractive compression of memory content
//!
//! Produces a shorter form of an entry's content by keeping its
//! highest-scoring sentences. Purely heuristic and deterministic: no model
//! is involved, so identical input always yields identical output.

/// Compress `content` down to roughly `target_ratio` of its sentences.
///
/// Sentences are split on the literal `". "` delimiter, scored, and the top
/// `max(1, floor(count * target_ratio))` are kept. Kept sentences are
/// reassembled in their original order so the summary reads as a narrative,
/// not as a ranking. Input with no sentences (empty or delimiter-only) is
/// returned unchanged.
pub fn compress(content: &str, target_ratio: f32) -> String {
    let sentences: Vec<&str> = content
        .split(". ")
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();

    if sentences.is_empty() {
        return content.to_string();
    }

    let target_count = ((sentences.len() as f32 * target_ratio).floor() as usize).max(1);

    let mut ranked: Vec<(usize, u32)> = sentences
        .iter()
        .map(|s| sentence_score(s))
        .enumerate()
        .collect();
    // Stable sort: equal scores keep the earlier sentence first.
    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    ranked.truncate(target_count);
    // Back to narrative order.
    ranked.sort_by_key(|&(position, _)| position);

    let mut summary = ranked
        .iter()
        .map(|&(position, _)| sentences[position])
        .collect::<Vec<_>>()
        .join(". ");

    if content.ends_with('.') && !summary.ends_with('.') {
        summary.push('.');
    }

    summary
}

/// Heuristic sentence score: word count, commas weighted double, digits
/// capped at 3, plus 1 for a question or exclamation ending.
fn sentence_score(sentence: &str) -> u32 {
    let words = sentence.split_whitespace().count() as u32;
    let commas = 2 * sentence.matches(',').count() as u32;
    let digits = sentence.chars().filter(|c| c.is_ascii_digit()).count().min(3) as u32;
    let emphasis = u32::from(sentence.ends_with('?') || sentence.ends_with('!'));

    words + commas + digits + emphasis
}
