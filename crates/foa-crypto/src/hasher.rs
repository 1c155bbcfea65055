use foa_types::{ChainId, ExtId};
use sha2::{Digest, Sha256, Sha512};

/// Plain SHA-256.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

/// Entry hash construction used by the ledger: `SHA-256(SHA-512(data) || data)`.
///
/// Prefixing the SHA-512 digest defeats length-extension on the outer hash.
pub fn ledger_hash(data: &[u8]) -> [u8; 32] {
    let inner = Sha512::digest(data);
    let mut outer = Sha256::new();
    outer.update(inner);
    outer.update(data);
    outer.finalize().into()
}

/// Derive a chain id from the external ids of the chain's first entry.
///
/// `SHA-256( SHA-256(ext_0) || SHA-256(ext_1) || ... )`. The first entry's
/// content does not take part, so a chain id can be computed before the
/// content is known.
pub fn chain_id(ext_ids: &[ExtId]) -> ChainId {
    let mut hasher = Sha256::new();
    for ext in ext_ids {
        hasher.update(sha256(ext.as_bytes()));
    }
    ChainId::from_hash(hasher.finalize().into())
}
