use crate::config::VIDEO_MIME;
use crate::media::{MediaSource, StreamDescriptor, StreamKind};
use std::collections::HashSet;
use tracing::debug;

/// Stream selection over a resolved [`MediaSource`].
///
/// All functions here are pure: they filter, sort and pick from the
/// stream list without touching the network. Quality labels carry a fixed
/// numeric suffix per kind (`"1080p"`, `"128kbps"`); candidates are
/// deduplicated and ordered by the descending numeric value parsed from
/// the label.

/// Suffix length of resolution labels ("p").
pub const RESOLUTION_SUFFIX: usize = 1;

/// Suffix length of bit-rate labels ("kbps").
pub const BIT_RATE_SUFFIX: usize = 4;

fn label_value(label: &str, suffix_len: usize) -> Option<u64> {
    if label.len() <= suffix_len {
        return None;
    }
    let cut = label.len() - suffix_len;
    label[..cut].parse().ok()
}

/// Deduplicates labels and sorts them descending by the numeric value in
/// front of the fixed-length suffix. Labels that do not parse are dropped.
pub fn sort_labels<I>(labels: I, suffix_len: usize) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let unique: HashSet<String> = labels.into_iter().collect();
    let mut parsed: Vec<(u64, String)> = unique
        .into_iter()
        .filter_map(|label| match label_value(&label, suffix_len) {
            Some(value) => Some((value, label)),
            None => {
                debug!("Skipping unparsable quality label: {label}");
                None
            }
        })
        .collect();
    parsed.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));
    parsed.into_iter().map(|(_, label)| label).collect()
}

/// Selectable resolutions for the requested progressive flag, mp4 only.
pub fn resolutions(source: &MediaSource, progressive: bool) -> Vec<String> {
    let labels = source
        .streams
        .iter()
        .filter(|s| {
            s.kind == StreamKind::Video && s.progressive == progressive && s.mime_type == VIDEO_MIME
        })
        .map(|s| s.label.clone());
    sort_labels(labels, RESOLUTION_SUFFIX)
}

/// Selectable audio bit rates. Token-gated streams are excluded when no
/// verification token is present, mirroring what the downloader would
/// actually be able to fetch.
pub fn bit_rates(source: &MediaSource, token_present: bool) -> Vec<String> {
    let labels = source
        .streams
        .iter()
        .filter(|s| s.kind == StreamKind::Audio && (token_present || !s.requires_token))
        .map(|s| s.label.clone());
    sort_labels(labels, BIT_RATE_SUFFIX)
}

/// Exact-match video stream for the selected resolution and mode.
pub fn select_video<'a>(
    source: &'a MediaSource,
    resolution: &str,
    progressive: bool,
) -> Option<&'a StreamDescriptor> {
    source.streams.iter().find(|s| {
        s.kind == StreamKind::Video && s.label == resolution && s.progressive == progressive
    })
}

/// Exact-match adaptive audio stream for the selected bit rate.
pub fn select_audio<'a>(
    source: &'a MediaSource,
    bit_rate: &str,
    token_present: bool,
) -> Option<&'a StreamDescriptor> {
    source.streams.iter().find(|s| {
        s.kind == StreamKind::Audio && s.label == bit_rate && (token_present || !s.requires_token)
    })
}

/// Highest-resolution progressive stream, preferring mp4 containers.
/// Used as the fallback source for audio extraction.
pub fn best_progressive(source: &MediaSource) -> Option<&StreamDescriptor> {
    let progressive: Vec<&StreamDescriptor> =
        source.streams.iter().filter(|s| s.progressive).collect();

    let mp4: Vec<&StreamDescriptor> = progressive
        .iter()
        .copied()
        .filter(|s| s.mime_type == VIDEO_MIME)
        .collect();

    let candidates = if mp4.is_empty() { progressive } else { mp4 };
    candidates
        .into_iter()
        .max_by_key(|s| label_value(&s.label, RESOLUTION_SUFFIX).unwrap_or(0))
}
