//! ABOUTME: Stable internal-ID derivation for the per-tenant vector index
//! ABOUTME: FNV-1a over the document UUID, reduced to the 31-bit index ID space

use uuid::Uuid;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// FNV-1a 64-bit hash. Deterministic across processes and restarts, which the
/// index reverse-mapping depends on.
#[must_use]
pub fn fnv1a64(bytes: &[u8]) -> u64 {
    let mut hash = FNV_OFFSET;
    for b in bytes {
        hash ^= u64::from(*b);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// Internal vector-index ID for a document: `fnv1a64(uuid) mod 2^31`.
///
/// Collisions are tolerated: the reverse map is reconstructed from the
/// relational store by enumerating the tenant's documents, so a colliding ID
/// resolves to whichever documents share it and ranking is preserved.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn vector_internal_id(document_id: &Uuid) -> u32 {
    (fnv1a64(document_id.to_string().as_bytes()) % (1 << 31)) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fnv1a64_matches_reference_vectors() {
        // Published FNV-1a test vectors
        assert_eq!(fnv1a64(b""), 0xcbf2_9ce4_8422_2325);
        assert_eq!(fnv1a64(b"a"), 0xaf63_dc4c_8601_ec8c);
        assert_eq!(fnv1a64(b"foobar"), 0x85944171f73967e8);
    }

    #[test]
    fn internal_id_is_stable_and_31_bit() {
        let id = Uuid::parse_str("6ba7b810-9dad-11d1-80b4-00c04fd430c8").unwrap();
        let a = vector_internal_id(&id);
        let b = vector_internal_id(&id);
        assert_eq!(a, b);
        assert!(a < (1 << 31));
    }
}
