//! Reservation priority scoring.

/// Compute a 0-100 reservation priority from a commit's quality scores and
/// size pattern.
///
/// The weights are load-bearing: stored priorities were computed with this
/// exact formula, so any change here would make old and new rows
/// incomparable.
///
/// - habitat score (0-200 scale) contributes up to 40 points (score / 5);
/// - suitability contributes up to 30 points, difficulty up to 20, both
///   accepting either a 0-1 fraction or a 0-100 scale;
/// - a pattern bonus adds 5 for a single-file commit with >= 200 additions
///   and 5 more for a >= 3 file commit with >= 300 additions.
pub fn score(
    habitat: f64,
    suitability: Option<f64>,
    difficulty: Option<f64>,
    file_changes: i64,
    additions: i64,
) -> u8 {
    let habitat_part = (habitat / 5.0).clamp(0.0, 40.0);

    let s = suitability.unwrap_or(0.0);
    let s_norm = if s <= 1.0 { s * 100.0 } else { s };
    let suitability_part = ((s_norm / 100.0) * 30.0).clamp(0.0, 30.0);

    let d = difficulty.unwrap_or(0.0);
    let d_norm = if d <= 1.0 { d * 100.0 } else { d };
    let difficulty_part = ((d_norm / 100.0) * 20.0).clamp(0.0, 20.0);

    let mut pattern_bonus = 0.0;
    if file_changes == 1 && additions >= 200 {
        pattern_bonus += 5.0;
    }
    if file_changes >= 3 && additions >= 300 {
        pattern_bonus += 5.0;
    }

    let raw = habitat_part + suitability_part + difficulty_part + pattern_bonus;
    raw.round().clamp(0.0, 100.0) as u8
}
