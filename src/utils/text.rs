use sha2::{Digest, Sha256};

/// Dedup key for question text: trimmed, lowercased, inner whitespace
/// collapsed to single spaces. No punctuation or script-specific folding.
pub fn normalized_text_key(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Hex SHA-256 of the dedup key, stored alongside bank rows.
pub fn text_hash(text: &str) -> String {
    hex::encode(Sha256::digest(normalized_text_key(text).as_bytes()))
}

pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}
