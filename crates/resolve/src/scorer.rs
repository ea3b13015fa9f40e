//! Substring-tolerant similarity scoring on a 0-100 scale.
//!
//! A query contained verbatim in a value scores 100 regardless of how much
//! longer the value is; otherwise the score is the best normalized
//! Levenshtein similarity over same-length windows of the longer string.

/// Score `query` against `value`, case-insensitively.
///
/// Returns 0 when either side is empty after trimming.
pub fn partial_ratio(query: &str, value: &str) -> f32 {
    let a = query.trim().to_lowercase();
    let b = value.trim().to_lowercase();
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let (needle, hay) = if a.chars().count() <= b.chars().count() {
        (a, b)
    } else {
        (b, a)
    };

    if hay.contains(&needle) {
        return 100.0;
    }

    let hay_chars: Vec<char> = hay.chars().collect();
    let window = needle.chars().count();

    let mut best = strsim::normalized_levenshtein(&needle, &hay);
    for slice in hay_chars.windows(window) {
        let candidate: String = slice.iter().collect();
        let score = strsim::normalized_levenshtein(&needle, &candidate);
        if score > best {
            best = score;
        }
    }

    (best * 100.0) as f32
}
