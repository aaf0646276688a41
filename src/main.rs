use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use image::{ImageFormat, RgbImage};
use indicatif::{ProgressBar, ProgressStyle};
use log::info;
use rayon::prelude::*;

use stegforge::config::{
    DEFAULT_COEFFICIENT_STEP, DEFAULT_JPEG_QUALITY, DEFAULT_LSB_BITS, DEFAULT_SENSITIVITY,
    HEADER_RESERVE_BYTES, RGB_CHANNELS,
};
use stegforge::{capacity, pipeline};
use stegforge::{Detector, EccScheme, EmbeddingMethod, PipelineHook, RecompressHook, StegoConfig};

/// stegforge: hide messages in images with LSB, luma DCT or chroma wavelet embedding.
#[derive(Parser)]
#[command(name = "stegforge", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Options that must match between encode and decode.
#[derive(Args)]
struct EmbedOptions {
    /// Embedding method: lsb, dct or dwt
    #[arg(short, long, default_value_t = EmbeddingMethod::Spatial)]
    method: EmbeddingMethod,

    /// Password to seal the message with
    #[arg(short, long)]
    password: Option<String>,

    /// Reed-Solomon parity bytes per codeword (enables error correction)
    #[arg(long, conflicts_with = "replicate")]
    nsym: Option<usize>,

    /// Use triple replication instead of Reed-Solomon
    #[arg(long)]
    replicate: bool,

    /// Low-order bits used per channel (lsb only)
    #[arg(long, default_value_t = DEFAULT_LSB_BITS)]
    lsb_bits: usize,

    /// Quantisation step for DCT coefficients (dct only). Small steps leave
    /// little margin for 8-bit RGB rounding, so encoding may reject the cover;
    /// the default is sized to survive JPEG quality 75
    #[arg(long, default_value_t = DEFAULT_COEFFICIENT_STEP, value_parser = parse_step)]
    coefficient_step: f64,
}

impl EmbedOptions {
    fn config(&self) -> StegoConfig {
        let ecc = match (self.nsym, self.replicate) {
            (Some(nsym), _) => Some(EccScheme::ReedSolomon { nsym }),
            (None, true) => Some(EccScheme::Replication),
            (None, false) => None,
        };
        StegoConfig {
            lsb_bits: self.lsb_bits,
            coefficient_step: self.coefficient_step,
            ecc,
            ..Default::default()
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Hide a message in an image
    Encode {
        /// Cover image
        #[arg(short, long)]
        input: PathBuf,

        /// Output image (always written as PNG)
        #[arg(short, long)]
        output: PathBuf,

        /// Message text
        #[arg(long, conflicts_with = "message_file", required_unless_present = "message_file")]
        message: Option<String>,

        /// Read the message from a file
        #[arg(long)]
        message_file: Option<PathBuf>,

        #[command(flatten)]
        opts: EmbedOptions,
    },

    /// Recover a hidden message
    Decode {
        /// Stego image
        #[arg(short, long)]
        input: PathBuf,

        /// Write the message here instead of printing it
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        opts: EmbedOptions,
    },

    /// Score images for signs of LSB embedding
    Detect {
        /// Images to analyse
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Sensitivity 1-10 (5 = base weights)
        #[arg(short, long, default_value_t = DEFAULT_SENSITIVITY)]
        sensitivity: u8,
    },

    /// Report how much an image can carry
    Capacity {
        /// Cover image
        #[arg(short, long)]
        input: PathBuf,

        /// Planned payload size in bytes
        #[arg(long, default_value_t = 0)]
        payload_bytes: usize,

        /// Planned Reed-Solomon parity bytes
        #[arg(long, default_value_t = 0)]
        nsym: usize,

        /// Low-order bits per channel
        #[arg(long, default_value_t = DEFAULT_LSB_BITS)]
        lsb_bits: usize,

        /// Bytes reserved for framing metadata
        #[arg(long, default_value_t = HEADER_RESERVE_BYTES)]
        header_reserve: usize,
    },

    /// Recompress an image as JPEG and write the result as PNG
    Recompress {
        #[arg(short, long)]
        input: PathBuf,

        #[arg(short, long)]
        output: PathBuf,

        /// JPEG quality 1-100
        #[arg(short, long, default_value_t = DEFAULT_JPEG_QUALITY)]
        quality: u8,
    },
}

fn parse_step(s: &str) -> std::result::Result<f64, String> {
    let step: f64 = s.parse().map_err(|e| format!("{e}"))?;
    if !(step.is_finite() && step >= 1.0) {
        return Err(format!("coefficient step must be at least 1, got {step}"));
    }
    Ok(step)
}

fn load_rgb(path: &Path) -> Result<RgbImage> {
    let img = image::open(path).with_context(|| format!("failed to open image {}", path.display()))?;
    Ok(img.to_rgb8())
}

fn save_png(image: &RgbImage, path: &Path) -> Result<()> {
    image
        .save_with_format(path, ImageFormat::Png)
        .with_context(|| format!("failed to write {}", path.display()))
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Encode {
            input,
            output,
            message,
            message_file,
            opts,
        } => {
            let message = match (message, message_file) {
                (Some(text), _) => text.into_bytes(),
                (None, Some(path)) => fs::read(&path)
                    .with_context(|| format!("failed to read message file {}", path.display()))?,
                (None, None) => bail!("either --message or --message-file is required"),
            };
            let cfg = opts.config();

            let cover = load_rgb(&input)?;
            let outcome = pipeline::encode::encode_message(
                &cover,
                &message,
                opts.method,
                opts.password.as_deref(),
                &cfg,
            )?;
            save_png(&outcome.image, &output)?;
            info!("wrote {}", output.display());
        }

        Commands::Decode { input, output, opts } => {
            let cfg = opts.config();
            let stego = load_rgb(&input)?;
            let outcome = pipeline::decode::decode_message(
                &stego,
                opts.method,
                opts.password.as_deref(),
                &cfg,
                None,
            )?;

            match (outcome.message, output) {
                (None, _) => println!("no hidden message found"),
                (Some(message), Some(path)) => {
                    fs::write(&path, &message)
                        .with_context(|| format!("failed to write {}", path.display()))?;
                    info!("wrote {} bytes to {}", message.len(), path.display());
                }
                (Some(message), None) => println!("{}", String::from_utf8_lossy(&message)),
            }
        }

        Commands::Detect { inputs, sensitivity } => {
            let cfg = StegoConfig {
                sensitivity,
                ..Default::default()
            };
            let detector = Detector::from_config(&cfg)?;

            let progress = ProgressBar::new(inputs.len() as u64);
            progress.set_style(
                ProgressStyle::default_bar()
                    .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} images ({eta})")?
                    .progress_chars("##-"),
            );
            if inputs.len() < 2 {
                progress.set_draw_target(indicatif::ProgressDrawTarget::hidden());
            }

            let reports: Vec<Result<_>> = inputs
                .par_iter()
                .map(|path| {
                    let report = load_rgb(path).and_then(|img| Ok(detector.analyze(&img)?));
                    progress.inc(1);
                    report
                })
                .collect();
            progress.finish_and_clear();

            for (path, report) in inputs.iter().zip(reports) {
                println!("{}: {}", path.display(), report?);
            }
        }

        Commands::Capacity {
            input,
            payload_bytes,
            nsym,
            lsb_bits,
            header_reserve,
        } => {
            let cfg = StegoConfig {
                lsb_bits,
                header_reserve_bytes: header_reserve,
                ..Default::default()
            };
            let img = load_rgb(&input)?;
            let report = capacity::capacity_report(
                img.dimensions(),
                payload_bytes,
                nsym,
                RGB_CHANNELS,
                cfg.lsb_bits,
                cfg.header_reserve_bytes,
            )?;
            print!("{report}");
        }

        Commands::Recompress {
            input,
            output,
            quality,
        } => {
            let cfg = StegoConfig {
                jpeg_quality: quality,
                ..Default::default()
            };
            let img = load_rgb(&input)?;
            let damaged = RecompressHook::from(&cfg).after_encode(img)?;
            save_png(&damaged, &output)?;
            info!("wrote {} (JPEG quality {quality})", output.display());
        }
    }

    Ok(())
}
