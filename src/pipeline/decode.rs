use std::time::Instant;

use image::RgbImage;
use log::info;

use crate::bits;
use crate::config::StegoConfig;
use crate::crypto;
use crate::embed::{self, EmbeddingMethod, EmbeddingPlan};
use crate::error::Result;

use super::{Operation, OperationReport};

/// Result of [`decode_message`]. `message` is `None` when no hidden message was found.
#[derive(Debug, Clone)]
pub struct DecodeOutcome {
    pub message: Option<Vec<u8>>,
    pub report: OperationReport,
}

/// Full decode pipeline: extract -> [ecc recover] -> [open].
///
/// With neither error correction nor a password the extracted bytes must be
/// printable text, otherwise the image is treated as carrying no message.
/// An uncorrectable ECC payload or a failed open is an error, distinct from
/// finding nothing.
pub fn decode_message(
    image: &RgbImage,
    method: EmbeddingMethod,
    password: Option<&str>,
    cfg: &StegoConfig,
    plan: Option<&EmbeddingPlan>,
) -> Result<DecodeOutcome> {
    let start = Instant::now();

    // Step 1: Pull the raw payload out of the image
    let raw = match plan {
        Some(plan) => embed::extract_with_plan(image, plan, cfg),
        None => embed::extract(image, method, cfg),
    };

    let Some(raw) = raw else {
        info!("no hidden message found ({method})");
        return Ok(DecodeOutcome {
            message: None,
            report: OperationReport {
                method,
                operation: Operation::Decode,
                success: false,
                message_bytes: 0,
                embedded_bytes: 0,
                symbols_corrected: 0,
                elapsed: start.elapsed(),
            },
        });
    };
    let embedded_bytes = raw.len();
    info!("extracted {embedded_bytes} bytes with {method}");

    // Step 2: Error correction
    let (payload, symbols_corrected) = match cfg.ecc {
        Some(scheme) => {
            let (payload, corrected) = scheme.decode(&raw)?;
            info!("{scheme:?}: corrected {corrected} symbols");
            (payload, corrected)
        }
        None => (raw, 0),
    };

    // Step 3: Open (if sealed)
    let message = match password {
        Some(pw) => Some(crypto::open(pw, &payload)?),
        None if cfg.ecc.is_none() => bits::printable_text(&payload).map(String::into_bytes),
        None => Some(payload),
    };

    let report = OperationReport {
        method,
        operation: Operation::Decode,
        success: message.is_some(),
        message_bytes: message.as_ref().map_or(0, Vec::len),
        embedded_bytes,
        symbols_corrected,
        elapsed: start.elapsed(),
    };
    info!("decode complete! {report}");

    Ok(DecodeOutcome { message, report })
}
