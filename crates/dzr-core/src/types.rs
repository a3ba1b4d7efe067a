//! Core types for track resolution and streaming

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use url::Url;

use crate::crypto::CipherContext;

// =============================================================================
// Media Vocabulary
// =============================================================================

/// Audio format tag, spelled exactly as the media service spells it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Format {
    #[serde(rename = "FLAC")]
    Flac,
    #[serde(rename = "MP3_320")]
    Mp3_320,
    #[serde(rename = "MP3_128")]
    Mp3_128,
    #[serde(rename = "MP3_64")]
    Mp3_64,
    #[serde(rename = "MP3_MISC")]
    Mp3Misc,
    #[serde(other)]
    Unknown,
}

impl Format {
    /// Wire name of the format
    pub fn as_str(&self) -> &'static str {
        match self {
            Format::Flac => "FLAC",
            Format::Mp3_320 => "MP3_320",
            Format::Mp3_128 => "MP3_128",
            Format::Mp3_64 => "MP3_64",
            Format::Mp3Misc => "MP3_MISC",
            Format::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cipher tag attached to a media source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Cipher {
    #[serde(rename = "BF_CBC_STRIPE")]
    BfCbcStripe,
    #[serde(rename = "NONE")]
    None,
    #[serde(other)]
    Unknown,
}

impl Cipher {
    /// Wire name of the cipher
    pub fn as_str(&self) -> &'static str {
        match self {
            Cipher::BfCbcStripe => "BF_CBC_STRIPE",
            Cipher::None => "NONE",
            Cipher::Unknown => "UNKNOWN",
        }
    }
}

/// A `{cipher, format}` pair as sent in a media request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CipherFormat {
    pub cipher: Cipher,
    pub format: Format,
}

impl CipherFormat {
    /// Stripe-encrypted variant of a format
    pub const fn stripe(format: Format) -> Self {
        Self {
            cipher: Cipher::BfCbcStripe,
            format,
        }
    }
}

/// Requested audio quality
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    Lossless,
    #[default]
    High,
    Standard,
    Low,
}

impl Quality {
    /// Formats to request, best first
    pub fn formats(&self) -> &'static [Format] {
        match self {
            Quality::Lossless => &[
                Format::Flac,
                Format::Mp3_320,
                Format::Mp3_128,
                Format::Mp3_64,
                Format::Mp3Misc,
            ],
            Quality::High => &[Format::Mp3_320, Format::Mp3_128, Format::Mp3_64, Format::Mp3Misc],
            Quality::Standard => &[Format::Mp3_128, Format::Mp3_64, Format::Mp3Misc],
            Quality::Low => &[Format::Mp3_64, Format::Mp3Misc],
        }
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Quality::Lossless => "lossless",
            Quality::High => "high",
            Quality::Standard => "standard",
            Quality::Low => "low",
        };
        f.write_str(name)
    }
}

impl FromStr for Quality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "lossless" | "flac" => Ok(Quality::Lossless),
            "high" | "320" => Ok(Quality::High),
            "standard" | "128" => Ok(Quality::Standard),
            "low" | "64" => Ok(Quality::Low),
            other => Err(format!("unknown quality '{}'", other)),
        }
    }
}

// =============================================================================
// Requests and Responses
// =============================================================================

/// What the consumer asks to play
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackStreamRequest {
    /// Numeric catalog track id
    pub track_id: String,
    /// Per-track rights token issued by the catalog
    pub track_token: String,
    /// Size of the `MP3_MISC` rendition, when the catalog reported one
    pub file_size_hint: Option<u64>,
    /// Preferred quality
    pub quality: Quality,
}

impl TrackStreamRequest {
    /// Create a request at the default quality
    pub fn new(track_id: impl Into<String>, track_token: impl Into<String>) -> Self {
        Self {
            track_id: track_id.into(),
            track_token: track_token.into(),
            file_size_hint: None,
            quality: Quality::default(),
        }
    }

    pub fn with_quality(mut self, quality: Quality) -> Self {
        self.quality = quality;
        self
    }

    pub fn with_file_size_hint(mut self, size: u64) -> Self {
        self.file_size_hint = Some(size);
        self
    }

    /// Ordered cipher/format list for the primary media request.
    ///
    /// A track that only exists as `MP3_MISC` (non-zero misc file size) is
    /// requested in that format alone.
    pub fn cipher_formats(&self) -> Vec<CipherFormat> {
        match self.file_size_hint {
            Some(size) if size > 0 => vec![CipherFormat::stripe(Format::Mp3Misc)],
            _ => self
                .quality
                .formats()
                .iter()
                .map(|format| CipherFormat::stripe(*format))
                .collect(),
        }
    }
}

/// One candidate playable source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaSource {
    pub url: Url,
    pub format: Format,
    pub cipher: Cipher,
    pub provider: Option<String>,
}

/// Parsed media endpoint answer for a single track
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MediaDescriptor {
    /// Candidate sources in service order
    pub sources: Vec<MediaSource>,
    /// The service refused the rights token for the requested media
    pub insufficient_rights: bool,
}

impl MediaDescriptor {
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn first_source(&self) -> Option<&MediaSource> {
        self.sources.first()
    }
}

/// Catalog metadata needed for legacy URL synthesis
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackMetadata {
    pub track_id: String,
    /// Content-origin hash
    pub md5_origin: String,
    pub media_version: String,
    /// Regional substitute track
    pub fallback_id: Option<String>,
    /// Size of the `MP3_MISC` rendition
    pub file_size_misc: Option<u64>,
}

// =============================================================================
// Resolution Output
// =============================================================================

/// Which branch of the resolution policy produced the URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResolutionPath {
    /// First source of the media endpoint, used verbatim
    Direct,
    /// Synthesized from the track's own metadata
    Synthesized,
    /// Synthesized from the regional substitute's metadata
    SynthesizedFallback { fallback_id: String },
}

impl fmt::Display for ResolutionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolutionPath::Direct => write!(f, "direct"),
            ResolutionPath::Synthesized => write!(f, "synthesized"),
            ResolutionPath::SynthesizedFallback { fallback_id } => {
                write!(f, "synthesized (fallback {})", fallback_id)
            }
        }
    }
}

/// A playable URL with everything needed to decrypt it
#[derive(Debug, Clone)]
pub struct ResolvedMedia {
    pub track_id: String,
    pub url: Url,
    pub cipher: CipherContext,
    /// Format reported by the service, if the URL came from it
    pub format: Option<Format>,
    pub path: ResolutionPath,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quality_format_order() {
        assert_eq!(Quality::Lossless.formats()[0], Format::Flac);
        assert_eq!(Quality::High.formats()[0], Format::Mp3_320);
        assert_eq!(Quality::Standard.formats(), &[Format::Mp3_128, Format::Mp3_64, Format::Mp3Misc]);
        for quality in [Quality::Lossless, Quality::High, Quality::Standard, Quality::Low] {
            assert_eq!(quality.formats().last(), Some(&Format::Mp3Misc));
        }
    }

    #[test]
    fn test_misc_file_size_narrows_request() {
        let request = TrackStreamRequest::new("3135556", "token")
            .with_quality(Quality::Lossless)
            .with_file_size_hint(4_200_000);
        assert_eq!(request.cipher_formats(), vec![CipherFormat::stripe(Format::Mp3Misc)]);

        let request = request.with_file_size_hint(0);
        assert_eq!(request.cipher_formats().len(), 5);
    }

    #[test]
    fn test_cipher_format_wire_names() {
        let json = serde_json::to_string(&CipherFormat::stripe(Format::Mp3_128)).unwrap();
        assert_eq!(json, r#"{"cipher":"BF_CBC_STRIPE","format":"MP3_128"}"#);

        let parsed: Format = serde_json::from_str(r#""MP4_RA3""#).unwrap();
        assert_eq!(parsed, Format::Unknown);
    }

    #[test]
    fn test_quality_from_str() {
        assert_eq!("FLAC".parse::<Quality>(), Ok(Quality::Lossless));
        assert_eq!("standard".parse::<Quality>(), Ok(Quality::Standard));
        assert!("ultra".parse::<Quality>().is_err());
    }
}
