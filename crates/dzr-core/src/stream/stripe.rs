//! Frame accumulator and stripe selection for one stream attempt

use bytes::{Bytes, BytesMut};
use tracing::debug;

use crate::crypto::{CipherContext, FRAME_SIZE};
use crate::error::Result;

/// Splits a byte stream into 2048-byte frames and decrypts every third one.
///
/// The frame counter starts at zero and only ever moves forward, so a decoder
/// lives exactly as long as one attempt. Restarting a stream means building a
/// new decoder.
#[derive(Debug)]
pub struct StripeDecoder {
    cipher: CipherContext,
    /// Index of the next frame to be emitted
    counter: u64,
    /// Bytes of the frame currently being assembled
    pending: BytesMut,
}

impl StripeDecoder {
    pub fn new(cipher: CipherContext) -> Self {
        Self {
            cipher,
            counter: 0,
            pending: BytesMut::with_capacity(FRAME_SIZE),
        }
    }

    /// Number of frames emitted so far
    pub fn counter(&self) -> u64 {
        self.counter
    }

    /// Bytes buffered towards the next frame
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Feed raw bytes and collect every frame they complete
    pub fn push(&mut self, input: &[u8]) -> Result<Vec<Bytes>> {
        self.pending.extend_from_slice(input);

        let mut frames = Vec::with_capacity(self.pending.len() / FRAME_SIZE);
        while self.pending.len() >= FRAME_SIZE {
            let frame = self.pending.split_to(FRAME_SIZE);
            frames.push(self.emit(frame)?);
        }
        Ok(frames)
    }

    /// Flush the trailing short frame at end of input, if any
    pub fn finish(&mut self) -> Result<Option<Bytes>> {
        if self.pending.is_empty() {
            return Ok(None);
        }
        let frame = self.pending.split();
        self.emit(frame).map(Some)
    }

    fn emit(&mut self, mut frame: BytesMut) -> Result<Bytes> {
        let index = self.counter;
        self.counter += 1;

        if CipherContext::is_cipher_frame(index) && !self.cipher.decrypt_frame(&mut frame)? {
            debug!(index, len = frame.len(), "Misaligned cipher frame passed through");
        }
        Ok(frame.freeze())
    }
}

/// Decode a complete in-memory stream
pub fn decode_all(cipher: CipherContext, input: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = StripeDecoder::new(cipher);
    let mut output = Vec::with_capacity(input.len());

    for frame in decoder.push(input)? {
        output.extend_from_slice(&frame);
    }
    if let Some(frame) = decoder.finish()? {
        output.extend_from_slice(&frame);
    }
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn plaintext(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 7 % 251) as u8).collect()
    }

    /// Encrypt the stripe positions of a plaintext stream
    fn stripe_encrypt(cipher: &CipherContext, data: &[u8]) -> Vec<u8> {
        let mut out = data.to_vec();
        for (index, frame) in out.chunks_mut(FRAME_SIZE).enumerate() {
            if CipherContext::is_cipher_frame(index as u64) {
                cipher.encrypt_frame(frame).unwrap();
            }
        }
        out
    }

    #[test]
    fn test_counter_advances_per_frame() {
        let mut decoder = StripeDecoder::new(CipherContext::for_track("3135556"));
        assert!(decoder.push(&[0u8; 1000]).unwrap().is_empty());
        assert_eq!(decoder.pending_len(), 1000);

        let frames = decoder.push(&[0u8; 5000]).unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!(decoder.counter(), 2);
        assert_eq!(decoder.pending_len(), 6000 - 2 * FRAME_SIZE);

        assert_eq!(decoder.finish().unwrap().map(|f| f.len()), Some(6000 - 2 * FRAME_SIZE));
        assert_eq!(decoder.counter(), 3);
        assert!(decoder.finish().unwrap().is_none());
    }

    #[test]
    fn test_only_every_third_frame_decrypted() {
        let cipher = CipherContext::for_track("3135556");
        let plain = plaintext(FRAME_SIZE * 7);
        let encrypted = stripe_encrypt(&cipher, &plain);

        assert_ne!(&encrypted[..FRAME_SIZE], &plain[..FRAME_SIZE]);
        assert_eq!(&encrypted[FRAME_SIZE..3 * FRAME_SIZE], &plain[FRAME_SIZE..3 * FRAME_SIZE]);

        assert_eq!(decode_all(cipher, &encrypted).unwrap(), plain);
    }

    #[test]
    fn test_chunking_does_not_change_output() {
        let cipher = CipherContext::for_track("987654321");
        let plain = plaintext(FRAME_SIZE * 4 + 808);
        let encrypted = stripe_encrypt(&cipher, &plain);

        let mut decoder = StripeDecoder::new(cipher);
        let mut output = Vec::new();
        for chunk in encrypted.chunks(333) {
            for frame in decoder.push(chunk).unwrap() {
                output.extend_from_slice(&frame);
            }
        }
        if let Some(frame) = decoder.finish().unwrap() {
            output.extend_from_slice(&frame);
        }
        assert_eq!(output, plain);
    }

    #[test]
    fn test_misaligned_trailing_cipher_frame_passes_through() {
        let cipher = CipherContext::for_track("3135556");
        // Three full frames, then a 1500-byte tail at index 3.
        let mut input = stripe_encrypt(&cipher, &plaintext(FRAME_SIZE * 3));
        let tail = plaintext(1500);
        input.extend_from_slice(&tail);

        let output = decode_all(cipher, &input).unwrap();
        assert_eq!(output.len(), input.len());
        assert_eq!(&output[3 * FRAME_SIZE..], &tail[..]);
    }

    #[test]
    fn test_aligned_trailing_cipher_frame_decrypted() {
        let cipher = CipherContext::for_track("3135556");
        let plain = plaintext(FRAME_SIZE * 3 + 1024);
        let encrypted = stripe_encrypt(&cipher, &plain);

        assert_eq!(decode_all(cipher, &encrypted).unwrap(), plain);
    }

    #[test]
    fn test_byte_count_preserved() {
        let cipher = CipherContext::for_track("42");
        for len in [0, 1, 7, 8, 2047, 2048, 2049, 6144, 6145, 10_000] {
            let input = plaintext(len);
            assert_eq!(decode_all(cipher, &input).unwrap().len(), len, "length {}", len);
        }
    }

    proptest! {
        #[test]
        fn prop_decode_preserves_length(input in proptest::collection::vec(any::<u8>(), 0..4 * FRAME_SIZE + 100)) {
            let cipher = CipherContext::for_track("3135556");
            prop_assert_eq!(decode_all(cipher, &input).unwrap().len(), input.len());
        }

        #[test]
        fn prop_chunk_size_does_not_change_output(len in 0usize..3 * FRAME_SIZE, chunk in 1usize..5000) {
            let cipher = CipherContext::for_track("987654321");
            let encrypted = stripe_encrypt(&cipher, &plaintext(len));

            let mut decoder = StripeDecoder::new(cipher);
            let mut output = Vec::new();
            for piece in encrypted.chunks(chunk) {
                for frame in decoder.push(piece).unwrap() {
                    output.extend_from_slice(&frame);
                }
            }
            if let Some(frame) = decoder.finish().unwrap() {
                output.extend_from_slice(&frame);
            }
            prop_assert_eq!(output, decode_all(cipher, &encrypted).unwrap());
        }
    }
}
