//! Human-comparable verifier codes for public keys.
//!
//! Before trusting a device, the user compares the code shown on both
//! screens. The code is six symbols drawn from SHA-256 of the public key.

use sha2::{Digest, Sha256};

/// Number of symbols in a verifier code.
pub const CODE_LENGTH: usize = 6;

const SYMBOLS: [&str; 64] = [
    "🐶", "🐱", "🐭", "🐹", "🐰", "🦊", "🐻", "🐼", "🐨", "🐯", "🦁", "🐮", "🐷", "🐸", "🐵",
    "🐔", "🐧", "🐦", "🦆", "🦉", "🐺", "🐗", "🐴", "🦄", "🐝", "🐛", "🦋", "🐌", "🐞", "🐢",
    "🐍", "🦖", "🐙", "🦑", "🦀", "🐡", "🐠", "🐬", "🐳", "🦈", "🐊", "🦓", "🦒", "🐘", "🦔",
    "🌵", "🌲", "🍄", "🌻", "🌙", "⭐", "🔥", "🌈", "❄️", "🍎", "🍋", "🍇", "🍉", "🥕", "🌽",
    "🎈", "🔑", "⚓", "🚀",
];

/// Emoji code for `public_key`.
pub fn emoji_code(public_key: &[u8]) -> Vec<String> {
    let digest = Sha256::digest(public_key);
    digest
        .iter()
        .take(CODE_LENGTH)
        .map(|byte| SYMBOLS[(*byte as usize) % SYMBOLS.len()].to_string())
        .collect()
}
