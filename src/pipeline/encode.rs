use std::time::Instant;

use image::RgbImage;
use log::{debug, info, warn};

use crate::capacity;
use crate::config::{self, StegoConfig};
use crate::crypto;
use crate::embed::{self, EmbeddingMethod, EmbeddingPlan, Placement};
use crate::error::Result;

use super::{Operation, OperationReport};

/// Result of [`encode_message`].
#[derive(Debug, Clone)]
pub struct EncodeOutcome {
    pub image: RgbImage,
    /// Plan used for embedding; pass it to the decoder for exact-length extraction.
    pub plan: EmbeddingPlan,
    pub report: OperationReport,
}

/// Full encode pipeline: message -> [seal] -> [ecc] -> plan -> embed.
///
/// Capacity is checked before any pixel is modified; the input image is never
/// mutated.
pub fn encode_message(
    image: &RgbImage,
    message: &[u8],
    method: EmbeddingMethod,
    password: Option<&str>,
    cfg: &StegoConfig,
) -> Result<EncodeOutcome> {
    let start = Instant::now();

    // Step 1: Seal (if needed)
    let mut payload = match password {
        Some(pw) => {
            info!("sealing {} byte message", message.len());
            crypto::seal(pw, message)?
        }
        None => message.to_vec(),
    };

    let reserve = capacity::can_fit_with(image.dimensions(), payload.len(), cfg)?;
    if !reserve.fits {
        debug!(
            "payload exceeds the {}-byte reserve estimate ({} bytes available); exact planning decides",
            cfg.header_reserve_bytes, reserve.available_bytes
        );
    }

    // Step 2: Wrap in error correction
    if let Some(scheme) = cfg.ecc {
        payload = scheme.encode(&payload)?;
        info!("{scheme:?}: payload expanded to {} bytes", payload.len());
    }

    // Step 3: Plan and embed
    let plan = embed::plan(image, method, payload.len(), cfg)?;
    if method == EmbeddingMethod::Spatial && payload.contains(&config::SENTINEL) {
        warn!("payload contains the sentinel byte; only planned extraction will recover it in full");
    }
    if let Placement::Coordinates(coords) = &plan.placement {
        info!("scorer selected {} pixels", coords.len());
    }
    let stego = embed::embed(image, &payload, &plan, cfg)?;

    let report = OperationReport {
        method,
        operation: Operation::Encode,
        success: true,
        message_bytes: message.len(),
        embedded_bytes: payload.len(),
        symbols_corrected: 0,
        elapsed: start.elapsed(),
    };
    info!("encode complete! {report}");

    Ok(EncodeOutcome {
        image: stego,
        plan,
        report,
    })
}
