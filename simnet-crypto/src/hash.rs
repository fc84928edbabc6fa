use simnet_types::primitives::Hash;

/// BLAKE3 of `data`.
pub fn blake3_hash(data: &[u8]) -> Hash {
    *blake3::hash(data).as_bytes()
}

/// BLAKE3 keyed by a context string, so the same bytes hashed for different
/// purposes never collide.
pub fn blake3_hash_domain(context: &str, data: &[u8]) -> Hash {
    let mut hasher = blake3::Hasher::new_derive_key(context);
    hasher.update(data);
    *hasher.finalize().as_bytes()
}

/// Incremental hasher over length-prefixed fields.
///
/// Framing makes `["ab", "c"]` and `["a", "bc"]` hash differently, which a
/// plain concatenation would not.
pub struct FramedHasher {
    inner: blake3::Hasher,
}

impl FramedHasher {
    pub fn new(context: &str) -> Self {
        Self {
            inner: blake3::Hasher::new_derive_key(context),
        }
    }

    /// Append one variable-length field.
    pub fn field(&mut self, bytes: &[u8]) -> &mut Self {
        self.inner.update(&(bytes.len() as u64).to_le_bytes());
        self.inner.update(bytes);
        self
    }

    /// Append a fixed-width integer.
    pub fn u64(&mut self, n: u64) -> &mut Self {
        self.inner.update(&n.to_le_bytes());
        self
    }

    pub fn finish(&self) -> Hash {
        *self.inner.finalize().as_bytes()
    }
}
