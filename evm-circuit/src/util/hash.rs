//! Keccak helpers used to build witnesses. The constraints never hash: they
//! only look digests up in the keccak table.

use crate::util::Word;
use sha3::{Digest, Keccak256};

/// Keccak-256 of the empty byte string, the code hash of accounts without
/// code.
pub const EMPTY_CODE_HASH: [u8; 32] = [
    0xc5, 0xd2, 0x46, 0x01, 0x86, 0xf7, 0x23, 0x3c, 0x92, 0x7e, 0x7d, 0xb2, 0xdc, 0xc7, 0x03, 0xc0,
    0xe5, 0x00, 0xb6, 0x53, 0xca, 0x82, 0x27, 0x3b, 0x7b, 0xfa, 0xd8, 0x04, 0x5d, 0x85, 0xa4, 0x70,
];

pub fn keccak256(bytes: &[u8]) -> [u8; 32] {
    Keccak256::digest(bytes).into()
}

/// The empty code hash as a word, read as a big-endian integer.
pub fn empty_code_hash_word() -> Word {
    Word::from_be_bytes(&EMPTY_CODE_HASH)
}

/// Digest read as a big-endian integer.
pub fn keccak256_word(bytes: &[u8]) -> Word {
    Word::from_be_bytes(&keccak256(bytes))
}

/// RLP encoding of `[sender, nonce]`, the preimage of a CREATE address.
pub fn rlp_encode_create_preimage(sender: &[u8; 20], nonce: u64) -> Vec<u8> {
    let nonce_bytes: Vec<u8> = nonce
        .to_be_bytes()
        .into_iter()
        .skip_while(|b| *b == 0)
        .collect();
    let mut payload = Vec::with_capacity(30);
    payload.push(0x80 + 20);
    payload.extend_from_slice(sender);
    match nonce_bytes.as_slice() {
        [] => payload.push(0x80),
        [byte] if *byte < 0x80 => payload.push(*byte),
        bytes => {
            payload.push(0x80 + bytes.len() as u8);
            payload.extend_from_slice(bytes);
        }
    }
    let mut encoded = Vec::with_capacity(payload.len() + 1);
    encoded.push(0xc0 + payload.len() as u8);
    encoded.extend(payload);
    encoded
}

/// Preimage of a CREATE2 address: `0xff ‖ sender ‖ salt ‖ keccak(init_code)`.
pub fn create2_preimage(sender: &[u8; 20], salt: &[u8; 32], init_code_hash: &[u8; 32]) -> Vec<u8> {
    let mut preimage = Vec::with_capacity(85);
    preimage.push(0xff);
    preimage.extend_from_slice(sender);
    preimage.extend_from_slice(salt);
    preimage.extend_from_slice(init_code_hash);
    preimage
}

/// The last 20 bytes of a digest.
pub fn address_from_digest(digest: &[u8; 32]) -> [u8; 20] {
    let mut address = [0u8; 20];
    address.copy_from_slice(&digest[12..]);
    address
}
