use blake3::Hasher;

/// BLAKE3 fingerprint of a value as seen under a given key.
///
/// Binding the key in keeps tokens from one key from matching another key that
/// happens to hold the same bytes. The full 256-bit output is kept: a
/// truncated collision would let a stale writer win a compare-and-set.
#[inline]
pub fn keyed_fingerprint(key: &str, value: &[u8]) -> [u8; 32] {
    let mut hasher = Hasher::new();
    hasher.update(&(key.len() as u64).to_le_bytes());
    hasher.update(key.as_bytes());
    hasher.update(value);
    *hasher.finalize().as_bytes()
}
