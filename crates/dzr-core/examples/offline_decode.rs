//! Offline decoding example
//!
//! Derives a track key, synthesizes the legacy URL and round-trips a
//! synthetic stripe-encrypted stream without touching the network.
//!
//! Run with: cargo run -p dzr-core --example offline_decode

use dzr_core::crypto::{CipherContext, FRAME_SIZE};
use dzr_core::legacy::{synthesize, FALLBACK_QUALITY};
use dzr_core::stream::decode_all;

fn main() -> dzr_core::Result<()> {
    println!("dzr Core - Offline Decoding Example");
    println!("===================================\n");

    let track_id = "3135556";
    let cipher = CipherContext::for_track(track_id);
    println!("Track {} key: {}", track_id, hex::encode(cipher.key()));

    let url = synthesize(track_id, "a1b2c3d4e5f60718293a4b5c6d7e8f90", "4", FALLBACK_QUALITY)?;
    println!("Legacy URL: {}\n", url);

    // Seven full frames plus a short tail
    let plain: Vec<u8> = (0..FRAME_SIZE * 7 + 1500).map(|i| (i % 256) as u8).collect();
    let mut encrypted = plain.clone();
    for (index, frame) in encrypted.chunks_mut(FRAME_SIZE).enumerate() {
        if CipherContext::is_cipher_frame(index as u64) {
            cipher.encrypt_frame(frame)?;
        }
    }

    let decoded = decode_all(cipher, &encrypted)?;
    println!("Input:   {} bytes", encrypted.len());
    println!("Decoded: {} bytes", decoded.len());
    println!("Matches plaintext: {}", decoded == plain);

    Ok(())
}
