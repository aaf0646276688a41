pub mod bits;
pub mod capacity;
pub mod config;
pub mod corruption;
pub mod crypto;
pub mod detect;
pub mod ecc;
pub mod embed;
pub mod error;
pub mod pipeline;
pub mod scorer;
pub mod transform;

pub use config::StegoConfig;
pub use detect::{DetectionReport, Detector, Verdict};
pub use ecc::EccScheme;
pub use embed::{EmbeddingMethod, EmbeddingPlan};
pub use error::StegoError;
pub use pipeline::decode::{decode_message, DecodeOutcome};
pub use pipeline::encode::{encode_message, EncodeOutcome};
pub use pipeline::hook::{NoopHook, PipelineHook, RecompressHook};
pub use pipeline::{roundtrip, OperationReport, RoundtripResult};
