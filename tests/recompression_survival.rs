//! DCT embedding under JPEG recompression.
//!
//! The luma coefficients are quantised with a step larger than the JPEG q75
//! quantiser at the carrier positions, so most bits survive on their own and
//! Reed-Solomon parity cleans up the rest.

use image::{Rgb, RgbImage};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use stegforge::corruption::recompress_and_reload;
use stegforge::embed::frequency;
use stegforge::{
    decode_message, encode_message, roundtrip, EmbeddingMethod, RecompressHook, StegoConfig,
};

const MESSAGE: &str = "Hello Stego World! This is a hidden message.";

fn cover(width: u32, height: u32, seed: u64) -> RgbImage {
    let mut rng = StdRng::seed_from_u64(seed);
    RgbImage::from_fn(width, height, |x, y| {
        let base = 64 + (x + y) * 100 / (width + height);
        let mut channel = || (base + rng.gen_range(0..40)) as u8;
        Rgb([channel(), channel(), channel()])
    })
}

#[test]
fn dct_with_reed_solomon_survives_q75() {
    let img = cover(512, 384, 42);
    let cfg = StegoConfig::with_reed_solomon(32);

    let result = roundtrip(
        &img,
        MESSAGE.as_bytes(),
        EmbeddingMethod::Frequency,
        None,
        &cfg,
        &RecompressHook { quality: 75 },
    )
    .unwrap();

    assert!(
        result.matched,
        "round-trip failed: {} != {:?}",
        result.original_hash, result.decoded_hash
    );
    assert_eq!(result.decode.message_bytes, MESSAGE.len());
    assert_eq!(result.decode.embedded_bytes, MESSAGE.len() + 32);
}

#[test]
fn blind_decode_after_recompression() {
    let img = cover(512, 384, 7);
    let cfg = StegoConfig::with_reed_solomon(32);

    let encoded = encode_message(&img, MESSAGE.as_bytes(), EmbeddingMethod::Frequency, None, &cfg).unwrap();
    let damaged = recompress_and_reload(&encoded.image, 75).unwrap();
    let decoded = decode_message(&damaged, EmbeddingMethod::Frequency, None, &cfg, None).unwrap();

    assert_eq!(decoded.message.as_deref(), Some(MESSAGE.as_bytes()));
    assert!(decoded.report.symbols_corrected <= 16);
}

#[test]
fn plain_dct_survives_high_quality() {
    let img = cover(256, 192, 9);
    let stego = frequency::encode(&img, b"Hello Stego World!", 12.0).unwrap();
    let damaged = recompress_and_reload(&stego, 95).unwrap();
    assert_eq!(
        frequency::decode_text(&damaged, 12.0).as_deref(),
        Some("Hello Stego World!")
    );
}
