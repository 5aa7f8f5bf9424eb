use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

static SIZE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([0-9]+)x([0-9]+)").expect("size pattern is valid"));

/// One artwork option published by the page, e.g. `{"src": "...", "sizes": "512x512"}`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtworkCandidate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sizes: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
}

/// The artwork picked for a track, with its parsed dimensions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectedArtwork {
    pub src: String,
    pub sizes: String,
    #[serde(rename = "type")]
    pub media_type: String,
    pub width: u64,
    pub height: u64,
    #[serde(rename = "totalPixels")]
    pub pixel_area: u64,
}

/// parses the first `<width>x<height>` occurrence of a size descriptor
pub fn parse_size(descriptor: &str) -> Option<(u64, u64)> {
    let captures = SIZE_PATTERN.captures(descriptor)?;
    let width = captures[1].parse().ok()?;
    let height = captures[2].parse().ok()?;
    Some((width, height))
}

/// Picks the candidate with the largest pixel area.
///
/// Candidates with a missing or empty source, or without a parseable size, are skipped.
/// On equal areas the first candidate wins, so the result depends on input order.
pub fn select_largest(candidates: Option<&[ArtworkCandidate]>) -> Option<SelectedArtwork> {
    let mut best: Option<SelectedArtwork> = None;

    for candidate in candidates.unwrap_or_default() {
        let (Some(src), Some(sizes)) = (&candidate.src, &candidate.sizes) else {
            continue;
        };
        if src.is_empty() || sizes.is_empty() {
            continue;
        }
        let Some((width, height)) = parse_size(sizes) else {
            continue;
        };
        let Some(pixel_area) = width.checked_mul(height) else {
            continue;
        };

        let best_area = best.as_ref().map(|b| b.pixel_area).unwrap_or(0);
        if pixel_area > best_area {
            best = Some(SelectedArtwork {
                src: src.clone(),
                sizes: sizes.clone(),
                media_type: candidate
                    .media_type
                    .clone()
                    .unwrap_or_else(|| "unknown".to_string()),
                width,
                height,
                pixel_area,
            });
        }
    }

    best
}
