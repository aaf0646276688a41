pub mod decode;
pub mod encode;
pub mod hook;

use std::fmt;
use std::time::Duration;

use anyhow::{Context, Result};
use image::RgbImage;
use sha2::{Digest, Sha256};

use crate::config::StegoConfig;
use crate::embed::EmbeddingMethod;
use hook::PipelineHook;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Encode,
    Decode,
}

/// What a logging sink needs to record about one encode or decode call.
#[derive(Debug, Clone)]
pub struct OperationReport {
    pub method: EmbeddingMethod,
    pub operation: Operation,
    pub success: bool,
    /// Plaintext message length.
    pub message_bytes: usize,
    /// Bytes actually written to or read from the image (after sealing and ECC).
    pub embedded_bytes: usize,
    pub symbols_corrected: usize,
    pub elapsed: Duration,
}

impl fmt::Display for OperationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?} {} success={} message={}B embedded={}B corrected={} in {:.1?}",
            self.operation,
            self.method,
            self.success,
            self.message_bytes,
            self.embedded_bytes,
            self.symbols_corrected,
            self.elapsed
        )
    }
}

/// Result of a full encode → hook → decode roundtrip.
pub struct RoundtripResult {
    /// SHA-256 hex digest of the original message.
    pub original_hash: String,
    /// SHA-256 hex digest of the decoded message, `None` if nothing was found.
    pub decoded_hash: Option<String>,
    /// `true` if the hashes match (lossless round-trip).
    pub matched: bool,
    pub encode: OperationReport,
    pub decode: OperationReport,
}

/// Run a full encode → hook → decode roundtrip.
///
/// Steps:
/// 1. SHA-256 hashes `message`.
/// 2. Encodes `message` into `image`.
/// 3. Calls `hook.after_encode(stego)`; recompression or transport happens here.
/// 4. Decodes the image returned by the hook, using the encode plan.
/// 5. SHA-256 hashes the recovered message and compares with the original.
///
/// # Example
///
/// ```rust,no_run
/// use stegforge::{roundtrip, EmbeddingMethod, RecompressHook, StegoConfig};
///
/// let cover = image::open("cover.png").unwrap().to_rgb8();
/// let result = roundtrip(
///     &cover,
///     b"Hello Stego World!",
///     EmbeddingMethod::Frequency,
///     None,
///     &StegoConfig::with_reed_solomon(32),
///     &RecompressHook { quality: 75 },
/// ).unwrap();
///
/// assert!(result.matched, "round-trip failed: {} != {:?}", result.original_hash, result.decoded_hash);
/// ```
pub fn roundtrip<H: PipelineHook>(
    image: &RgbImage,
    message: &[u8],
    method: EmbeddingMethod,
    password: Option<&str>,
    cfg: &StegoConfig,
    hook: &H,
) -> Result<RoundtripResult> {
    let original_hash = sha256_hex(message);

    let encoded = encode::encode_message(image, message, method, password, cfg)
        .context("failed to embed message")?;

    let received = hook.after_encode(encoded.image)?;

    let decoded = decode::decode_message(&received, method, password, cfg, Some(&encoded.plan))
        .context("failed to recover message")?;

    let decoded_hash = decoded.message.as_deref().map(sha256_hex);
    let matched = decoded_hash.as_deref() == Some(original_hash.as_str());

    Ok(RoundtripResult {
        original_hash,
        decoded_hash,
        matched,
        encode: encoded.report,
        decode: decoded.report,
    })
}

fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}
