use crate::models::{CongestionLevel, Coordinate, PathSegment};

/// Maps a provider congestion label onto the three levels riders see.
/// Unknown or unrecognised labels count as `Low`.
pub fn classify(label: &str) -> CongestionLevel {
    match label.trim().to_ascii_lowercase().as_str() {
        "moderate" => CongestionLevel::Moderate,
        "heavy" | "severe" => CongestionLevel::Heavy,
        _ => CongestionLevel::Low,
    }
}

/// Splits a route polyline into runs of equal congestion.
///
/// Segment `i` joins `geometry[i]` and `geometry[i + 1]`; its level comes from
/// `labels[i]` and defaults to `Low` when the label is missing. Adjacent runs
/// share their boundary point so the rendered path has no gaps.
pub fn segment_route(geometry: &[Coordinate], labels: Option<&[String]>) -> Vec<PathSegment> {
    let mut segments: Vec<PathSegment> = Vec::new();
    if geometry.len() < 2 {
        return segments;
    }

    for (i, pair) in geometry.windows(2).enumerate() {
        let level = labels
            .and_then(|labels| labels.get(i))
            .map(|label| classify(label))
            .unwrap_or(CongestionLevel::Low);

        match segments.last_mut() {
            Some(current) if current.level == level => current.coordinates.push(pair[1]),
            _ => segments.push(PathSegment {
                level,
                coordinates: vec![pair[0], pair[1]],
            }),
        }
    }
    segments
}
