use sha2::Digest;

/// Compares two client secrets through their SHA-256 digests so the
/// comparison time does not depend on where the inputs first differ.
pub fn secrets_match(provided: &str, expected: &str) -> bool {
    if expected.is_empty() {
        return false;
    }

    let mut a = sha2::Sha256::new();
    a.update(provided.as_bytes());
    let a = a.finalize();

    let mut b = sha2::Sha256::new();
    b.update(expected.as_bytes());
    let b = b.finalize();

    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
