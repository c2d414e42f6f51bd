//! Length-bucketed edit distance
//!
//! Short titles tolerate a single typo; long titles tolerate more.

/// Largest edit distance still accepted as a match for this title
pub fn max_distance(title: &str) -> usize {
    match title.chars().count() {
        0..=6 => 1,
        7..=25 => 4,
        _ => 8,
    }
}

/// Case-insensitive edit distance, or `None` when it exceeds the title's bucket
pub fn edit_distance(title: &str, candidate: &str) -> Option<usize> {
    let title = title.to_lowercase();
    let candidate = candidate.to_lowercase();
    if title == candidate {
        return Some(0);
    }

    let distance = strsim::levenshtein(&title, &candidate);
    if distance <= max_distance(&title) {
        Some(distance)
    } else {
        None
    }
}
