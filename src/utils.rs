
#[inline]
pub fn safe_truncate(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}


/// Label used when an entity or row has no usable display name.
#[inline]
pub fn placeholder_label(kind: &str, reference: impl std::fmt::Display) -> String {
    format!("{}-{}", kind.to_lowercase(), reference)
}
