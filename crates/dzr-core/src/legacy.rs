//! Legacy CDN URL synthesis
//!
//! When the media endpoint has nothing usable, a URL can still be built from
//! catalog metadata. The path is an AES-128-ECB encryption of a hashed,
//! `0xA4`-separated descriptor:
//!
//! ```text
//! A = md5_origin ¤ quality ¤ track_id ¤ media_version
//! B = md5hex(A) ¤ A ¤ pad('.')            (¤ = 0xA4)
//! url = https://e-cdns-proxy-{md5_origin[0]}.dzcdn.net/mobile/1/{hex(AES-ECB(B))}
//! ```
//!
//! The output must match the CDN byte for byte.

use aes::cipher::{generic_array::GenericArray, BlockEncrypt, KeyInit};
use aes::Aes128;
use url::Url;

use crate::crypto::md5_hex;
use crate::error::{Error, Result};

/// Static key for the URL path cipher
const URL_KEY: &[u8; 16] = b"jo6aey6haid2Teih";

/// Field separator inside the descriptor
const SEPARATOR: u8 = 0xA4;

/// Padding byte up to the AES block size
const PADDING: u8 = b'.';

const AES_BLOCK_SIZE: usize = 16;

/// Quality tier used when a URL has to be synthesized
pub const FALLBACK_QUALITY: u8 = 1;

/// Build the legacy CDN URL for a track.
///
/// Pure: identical inputs always produce the identical string.
pub fn synthesize(track_id: &str, md5_origin: &str, media_version: &str, quality: u8) -> Result<String> {
    let host_char = md5_origin
        .chars()
        .next()
        .ok_or_else(|| Error::resolution(track_id, "empty origin hash"))?;

    let descriptor = descriptor(track_id, md5_origin, media_version, quality);
    let digest = md5_hex(&descriptor);

    let mut buffer = Vec::with_capacity(digest.len() + descriptor.len() + 2 + AES_BLOCK_SIZE);
    buffer.extend_from_slice(digest.as_bytes());
    buffer.push(SEPARATOR);
    buffer.extend_from_slice(&descriptor);
    buffer.push(SEPARATOR);
    while buffer.len() % AES_BLOCK_SIZE != 0 {
        buffer.push(PADDING);
    }

    let cipher = Aes128::new(GenericArray::from_slice(URL_KEY));
    for block in buffer.chunks_exact_mut(AES_BLOCK_SIZE) {
        cipher.encrypt_block(GenericArray::from_mut_slice(block));
    }

    Ok(format!(
        "https://e-cdns-proxy-{}.dzcdn.net/mobile/1/{}",
        host_char,
        hex::encode(&buffer)
    ))
}

/// [`synthesize`], parsed into a [`Url`]
pub fn synthesize_url(track_id: &str, md5_origin: &str, media_version: &str, quality: u8) -> Result<Url> {
    Ok(Url::parse(&synthesize(track_id, md5_origin, media_version, quality)?)?)
}

fn descriptor(track_id: &str, md5_origin: &str, media_version: &str, quality: u8) -> Vec<u8> {
    let quality = quality.to_string();
    let mut out = Vec::with_capacity(md5_origin.len() + quality.len() + track_id.len() + media_version.len() + 3);
    out.extend_from_slice(md5_origin.as_bytes());
    out.push(SEPARATOR);
    out.extend_from_slice(quality.as_bytes());
    out.push(SEPARATOR);
    out.extend_from_slice(track_id.as_bytes());
    out.push(SEPARATOR);
    out.extend_from_slice(media_version.as_bytes());
    out
}
