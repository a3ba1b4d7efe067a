//! Per-track key derivation and stripe frame cipher
//!
//! Every track is encrypted with Blowfish-CBC under a key derived from its
//! id alone. Only every third 2048-byte frame is encrypted, and each of those
//! frames starts over from the same fixed IV.

use blowfish::Blowfish;
use cbc::cipher::{
    block_padding::NoPadding, generic_array::GenericArray, BlockDecryptMut, BlockEncryptMut,
    InnerIvInit, KeyInit,
};
use md5::{Digest, Md5};

use crate::error::{Error, Result};

type BfCbcDec = cbc::Decryptor<Blowfish>;
type BfCbcEnc = cbc::Encryptor<Blowfish>;

/// Embedded secret mixed into every track key
const TRACK_KEY_SECRET: &[u8; 16] = b"g4el58wc0zvf9na1";

/// Fixed IV used for every encrypted frame
pub const STRIPE_IV: [u8; 8] = [0, 1, 2, 3, 4, 5, 6, 7];

/// Size of one physical frame of the encrypted stream
pub const FRAME_SIZE: usize = 2048;

/// Blowfish block size; encrypted frames must be a multiple of it
pub const CIPHER_BLOCK_SIZE: usize = 8;

/// Every `STRIPE_PERIOD`-th frame is encrypted
pub const STRIPE_PERIOD: u64 = 3;

/// Lowercase hex MD5 digest of a byte string
pub fn md5_hex(input: &[u8]) -> String {
    hex::encode(Md5::digest(input))
}

/// Derive the 16-byte track key from a track id.
///
/// `key[i] = md5hex[i] ^ md5hex[i + 16] ^ secret[i]`
pub fn derive_key(track_id: &str) -> [u8; 16] {
    let digest = md5_hex(track_id.as_bytes());
    let (first, second) = digest.as_bytes().split_at(16);

    let mut key = [0u8; 16];
    for (i, byte) in key.iter_mut().enumerate() {
        *byte = first[i] ^ second[i] ^ TRACK_KEY_SECRET[i];
    }
    key
}

/// Key material and framing rules for one track
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CipherContext {
    key: [u8; 16],
}

impl CipherContext {
    /// Derive the context for a track
    pub fn for_track(track_id: &str) -> Self {
        Self {
            key: derive_key(track_id),
        }
    }

    pub fn from_key(key: [u8; 16]) -> Self {
        Self { key }
    }

    pub fn key(&self) -> &[u8; 16] {
        &self.key
    }

    pub fn iv(&self) -> &[u8; 8] {
        &STRIPE_IV
    }

    /// Whether the frame at `index` carries ciphertext
    pub fn is_cipher_frame(index: u64) -> bool {
        index % STRIPE_PERIOD == 0
    }

    /// Whether a frame of this length can be run through the block cipher
    pub fn is_block_aligned(len: usize) -> bool {
        len > 0 && len % CIPHER_BLOCK_SIZE == 0
    }

    /// Decrypt one frame in place as an independent CBC operation.
    ///
    /// Returns `false` and leaves the frame untouched when it is not block
    /// aligned.
    pub fn decrypt_frame(&self, frame: &mut [u8]) -> Result<bool> {
        if !Self::is_block_aligned(frame.len()) {
            return Ok(false);
        }

        self.decryptor()?
            .decrypt_padded_mut::<NoPadding>(frame)
            .map_err(|e| Error::Integrity(format!("frame decryption failed: {}", e)))?;
        Ok(true)
    }

    /// Encrypt one frame in place; the inverse of [`decrypt_frame`](Self::decrypt_frame)
    pub fn encrypt_frame(&self, frame: &mut [u8]) -> Result<bool> {
        if !Self::is_block_aligned(frame.len()) {
            return Ok(false);
        }

        let len = frame.len();
        self.encryptor()?
            .encrypt_padded_mut::<NoPadding>(frame, len)
            .map_err(|e| Error::Integrity(format!("frame encryption failed: {}", e)))?;
        Ok(true)
    }

    fn decryptor(&self) -> Result<BfCbcDec> {
        let cipher = <Blowfish as KeyInit>::new_from_slice(&self.key)
            .map_err(|e| Error::Integrity(format!("invalid track key: {}", e)))?;
        Ok(BfCbcDec::inner_iv_init(cipher, GenericArray::from_slice(&STRIPE_IV)))
    }

    fn encryptor(&self) -> Result<BfCbcEnc> {
        let cipher = <Blowfish as KeyInit>::new_from_slice(&self.key)
            .map_err(|e| Error::Integrity(format!("invalid track key: {}", e)))?;
        Ok(BfCbcEnc::inner_iv_init(cipher, GenericArray::from_slice(&STRIPE_IV)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_md5_hex_lowercase() {
        assert_eq!(md5_hex(b"password"), "5f4dcc3b5aa765d61d8327deb882cf99");
        assert_eq!(md5_hex(b"3135556").len(), 32);
    }

    #[test]
    fn test_derive_key_matches_manual_xor() {
        let digest = md5_hex(b"3135556");
        let bytes = digest.as_bytes();
        let expected: Vec<u8> = (0..16)
            .map(|i| bytes[i] ^ bytes[i + 16] ^ TRACK_KEY_SECRET[i])
            .collect();

        assert_eq!(derive_key("3135556").to_vec(), expected);
    }

    #[test]
    fn test_derive_key_known_answer() {
        assert_eq!(hex::encode(derive_key("3135556")), "6c6c666b39662c37652575603c643439");
    }

    #[test]
    fn test_decrypt_frame_known_answer() {
        let ctx = CipherContext::for_track("123456789");
        let mut frame: Vec<u8> = (0..FRAME_SIZE).map(|i| (i % 256) as u8).collect();

        assert!(ctx.decrypt_frame(&mut frame).unwrap());
        assert_eq!(
            hex::encode(&frame[..32]),
            "35bc9e7d901a2450abe8a50a81d6a320c4bb989479109e966e215bd716b2ecc2"
        );
    }

    proptest! {
        #[test]
        fn prop_derive_key_depends_only_on_id(id in "[0-9]{1,20}") {
            let key = derive_key(&id);
            prop_assert_eq!(key, derive_key(&id));
            let ctx = CipherContext::for_track(&id);
            prop_assert_eq!(ctx.key(), &key);
        }
    }

    #[test]
    fn test_derive_key_is_deterministic() {
        for id in ["1", "3135556", "123456789", "987654321", "18446744073709551615"] {
            assert_eq!(derive_key(id), derive_key(id));
        }
        assert_ne!(derive_key("123456789"), derive_key("987654321"));
    }

    #[test]
    fn test_cipher_frame_predicate() {
        let active: Vec<u64> = (0..10).filter(|i| CipherContext::is_cipher_frame(*i)).collect();
        assert_eq!(active, vec![0, 3, 6, 9]);
    }

    #[test]
    fn test_frame_round_trip() {
        let ctx = CipherContext::for_track("123456789");
        let plain: Vec<u8> = (0..FRAME_SIZE).map(|i| (i % 251) as u8).collect();

        let mut frame = plain.clone();
        assert!(ctx.encrypt_frame(&mut frame).unwrap());
        assert_ne!(frame, plain);

        assert!(ctx.decrypt_frame(&mut frame).unwrap());
        assert_eq!(frame, plain);
    }

    #[test]
    fn test_misaligned_frame_untouched() {
        let ctx = CipherContext::for_track("123456789");
        let mut frame = vec![0xAB; 1500];
        assert!(!ctx.decrypt_frame(&mut frame).unwrap());
        assert!(frame.iter().all(|b| *b == 0xAB));
    }
}
