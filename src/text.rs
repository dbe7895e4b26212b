// Text normalization used by every accent-insensitive comparison in the crate

use std::cmp::Ordering;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Lowercases, decomposes (NFD) and strips combining marks, so
/// `normalize("São Paulo") == normalize("sao paulo")`.
pub fn normalize(s: &str) -> String {
    s.to_lowercase()
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect()
}

/// Accent-insensitive equality after trimming.
pub fn matches(a: &str, b: &str) -> bool {
    normalize(a.trim()) == normalize(b.trim())
}

/// Orders display names the way a pt-BR reader expects: letters compare
/// without accents first ("Água Boa" before "Bauru"), and only names that are
/// equal on that primary key fall back to their accented form.
pub fn collate_pt_br(a: &str, b: &str) -> Ordering {
    normalize(a)
        .cmp(&normalize(b))
        .then_with(|| a.to_lowercase().cmp(&b.to_lowercase()))
        .then_with(|| a.cmp(b))
}
