//! Destination-safe names and human-readable sizes.

/// Characters OneDrive rejects in item names.
const RESERVED: &[char] = &['\\', '/', '*', '?', ':', '"', '<', '>', '|', '#'];

/// Longest name kept as-is.
pub const MAX_NAME_LEN: usize = 250;

/// Stem length kept when a name is shortened; the extension is preserved.
pub const TRUNCATED_STEM_LEN: usize = 245;

/// Stands in for names that are empty once trimmed.
pub const FALLBACK_NAME: &str = "untitled";

/// Replace reserved characters with `_`, shorten overlong names and trim
/// surrounding whitespace. Never returns an empty name.
///
/// ```
/// use core_migration::sanitize::sanitize_filename;
///
/// assert_eq!(sanitize_filename("Q1: plan?.docx"), "Q1_ plan_.docx");
/// ```
pub fn sanitize_filename(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| if RESERVED.contains(&c) { '_' } else { c })
        .collect();

    let sanitized = if replaced.chars().count() <= MAX_NAME_LEN {
        replaced.trim().to_string()
    } else {
        let (stem, extension) = split_extension(&replaced);
        let stem: String = stem.chars().take(TRUNCATED_STEM_LEN).collect();
        format!("{}{}", stem, extension).trim().to_string()
    };

    if sanitized.is_empty() {
        FALLBACK_NAME.to_string()
    } else {
        sanitized
    }
}

/// Split at the last dot, ignoring leading dots.
fn split_extension(name: &str) -> (&str, &str) {
    let leading = name.len() - name.trim_start_matches('.').len();
    match name[leading..].rfind('.') {
        Some(index) => name.split_at(leading + index),
        None => (name, ""),
    }
}

/// Format a byte count with one decimal, from B up to TB.
///
/// ```
/// use core_migration::sanitize::format_size;
///
/// assert_eq!(format_size(1536), "1.5 KB");
/// ```
pub fn format_size(bytes: u64) -> String {
    let mut value = bytes as f64;
    for unit in ["B", "KB", "MB", "GB"] {
        if value < 1024.0 {
            return format!("{:.1} {}", value, unit);
        }
        value /= 1024.0;
    }
    format!("{:.1} TB", value)
}
