//! Title rating, derived from review scores on every read.

/// Arithmetic mean of `scores`, `None` for an unreviewed title.
pub fn mean_score(scores: &[i32]) -> Option<f64> {
    if scores.is_empty() {
        return None;
    }
    let total: i64 = scores.iter().map(|&s| i64::from(s)).sum();
    Some(total as f64 / scores.len() as f64)
}

/// Rating as shown to clients: the mean rounded to the nearest whole score.
pub fn display_rating(scores: &[i32]) -> Option<i32> {
    mean_score(scores).map(|mean| mean.round() as i32)
}
