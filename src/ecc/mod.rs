//! Forward error correction for embedded payloads.
//!
//! Reed-Solomon over GF(2^8) (primitive polynomial 0x11D, generator 2, first
//! consecutive root 0). Codewords are at most 255 bytes; longer payloads are
//! split into `255 - nsym` byte data blocks, each followed by `nsym` parity
//! bytes. A block corrects up to `nsym / 2` corrupted bytes.
//!
//! Triple replication with per-byte majority vote is kept as the weaker
//! alternative scheme. It only survives when at most one of every three
//! replicas is damaged.

use std::sync::OnceLock;

use log::debug;
use thiserror::Error;

use crate::config;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum EccError {
    #[error("parity symbol count must be in 1..=254, got {0}")]
    InvalidParity(usize),
    #[error("codeword {block} has more errors than {nsym} parity bytes can correct")]
    TooManyErrors { block: usize, nsym: usize },
    #[error("codeword {block} is {len} bytes, shorter than its {nsym} parity bytes")]
    TruncatedCodeword { block: usize, len: usize, nsym: usize },
    #[error("replicated data length {0} is not a multiple of 3")]
    ReplicationLength(usize),
}

/// Redundancy scheme applied to a payload before embedding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EccScheme {
    ReedSolomon { nsym: usize },
    Replication,
}

impl EccScheme {
    pub fn encode(&self, payload: &[u8]) -> Result<Vec<u8>, EccError> {
        match *self {
            EccScheme::ReedSolomon { nsym } => add_redundancy(payload, nsym),
            EccScheme::Replication => Ok(replicate(payload)),
        }
    }

    /// Recover the payload, returning it with the number of corrected symbols.
    pub fn decode(&self, data: &[u8]) -> Result<(Vec<u8>, usize), EccError> {
        match *self {
            EccScheme::ReedSolomon { nsym } => {
                let (payload, stats) = recover_with_stats(data, nsym)?;
                Ok((payload, stats.total_errors))
            }
            EccScheme::Replication => majority_vote(data),
        }
    }

    /// Length in bytes of the encoded form of a `payload_len` byte payload.
    pub fn encoded_len(&self, payload_len: usize) -> usize {
        match *self {
            EccScheme::ReedSolomon { nsym } => estimate_overhead_rs(payload_len, nsym),
            EccScheme::Replication => {
                estimate_overhead_replication(payload_len, config::REPLICATION_FACTOR)
            }
        }
    }
}

// --- GF(2^8) arithmetic ---

const PRIM_POLY: u16 = 0x11D;

struct GfTables {
    exp: [u8; 512],
    log: [u8; 256],
}

fn gf() -> &'static GfTables {
    static TABLES: OnceLock<GfTables> = OnceLock::new();
    TABLES.get_or_init(|| {
        let mut exp = [0u8; 512];
        let mut log = [0u8; 256];
        let mut x: u16 = 1;
        for i in 0..255 {
            exp[i] = x as u8;
            exp[i + 255] = x as u8;
            log[x as usize] = i as u8;
            x <<= 1;
            if x & 0x100 != 0 {
                x ^= PRIM_POLY;
            }
        }
        exp[510] = exp[0];
        exp[511] = exp[1];
        GfTables { exp, log }
    })
}

fn gf_mul(a: u8, b: u8) -> u8 {
    if a == 0 || b == 0 {
        return 0;
    }
    let t = gf();
    t.exp[t.log[a as usize] as usize + t.log[b as usize] as usize]
}

fn gf_inv(a: u8) -> u8 {
    debug_assert_ne!(a, 0, "zero has no inverse in GF(2^8)");
    let t = gf();
    t.exp[255 - t.log[a as usize] as usize]
}

/// alpha^power for any (possibly negative) exponent.
fn alpha_pow(power: i64) -> u8 {
    gf().exp[power.rem_euclid(255) as usize]
}

/// Evaluate a polynomial stored highest degree first.
fn eval_desc(poly: &[u8], x: u8) -> u8 {
    poly.iter().fold(0u8, |acc, &c| gf_mul(acc, x) ^ c)
}

/// Evaluate a polynomial stored lowest degree first.
fn eval_asc(poly: &[u8], x: u8) -> u8 {
    poly.iter().rev().fold(0u8, |acc, &c| gf_mul(acc, x) ^ c)
}

/// g(x) = prod_{i=0}^{nsym-1} (x - alpha^i), highest degree first.
fn generator_poly(nsym: usize) -> Vec<u8> {
    let mut g = vec![1u8];
    for i in 0..nsym {
        let root = alpha_pow(i as i64);
        let mut next = vec![0u8; g.len() + 1];
        for (j, &c) in g.iter().enumerate() {
            next[j] ^= c;
            next[j + 1] ^= gf_mul(c, root);
        }
        g = next;
    }
    g
}

fn check_nsym(nsym: usize) -> Result<(), EccError> {
    if nsym == 0 || nsym >= config::RS_CODEWORD_LEN {
        return Err(EccError::InvalidParity(nsym));
    }
    Ok(())
}

// --- Encoding ---

/// Systematic encode of one block: `data ‖ parity`.
fn rs_encode_block(data: &[u8], gen: &[u8]) -> Vec<u8> {
    let nsym = gen.len() - 1;
    let mut remainder = vec![0u8; nsym];

    for &byte in data {
        let feedback = byte ^ remainder[0];
        for j in 0..nsym - 1 {
            remainder[j] = remainder[j + 1] ^ gf_mul(feedback, gen[j + 1]);
        }
        remainder[nsym - 1] = gf_mul(feedback, gen[nsym]);
    }

    let mut block = Vec::with_capacity(data.len() + nsym);
    block.extend_from_slice(data);
    block.extend_from_slice(&remainder);
    block
}

/// Reed-Solomon encode `payload` with `nsym` parity bytes per codeword.
///
/// Deterministic: the same `(payload, nsym)` always yields the same bytes.
pub fn add_redundancy(payload: &[u8], nsym: usize) -> Result<Vec<u8>, EccError> {
    check_nsym(nsym)?;
    let gen = generator_poly(nsym);
    let data_len = config::RS_CODEWORD_LEN - nsym;

    let mut encoded = Vec::with_capacity(estimate_overhead_rs(payload.len(), nsym));
    for chunk in payload.chunks(data_len) {
        encoded.extend(rs_encode_block(chunk, &gen));
    }
    Ok(encoded)
}

// --- Decoding ---

fn syndromes(block: &[u8], nsym: usize) -> Vec<u8> {
    (0..nsym).map(|i| eval_desc(block, alpha_pow(i as i64))).collect()
}

/// Berlekamp-Massey: error locator sigma(x), lowest degree first.
fn error_locator(synd: &[u8]) -> Vec<u8> {
    let mut sigma = vec![1u8];
    let mut prev = vec![1u8];
    let mut num_errors = 0usize;
    let mut shift = 1usize;
    let mut prev_discrepancy = 1u8;

    for n in 0..synd.len() {
        let mut delta = synd[n];
        for i in 1..sigma.len().min(n + 1) {
            delta ^= gf_mul(sigma[i], synd[n - i]);
        }

        if delta == 0 {
            shift += 1;
            continue;
        }

        let factor = gf_mul(delta, gf_inv(prev_discrepancy));
        let snapshot = sigma.clone();
        if sigma.len() < prev.len() + shift {
            sigma.resize(prev.len() + shift, 0);
        }
        for (i, &p) in prev.iter().enumerate() {
            sigma[i + shift] ^= gf_mul(factor, p);
        }

        if 2 * num_errors <= n {
            num_errors = n + 1 - num_errors;
            prev = snapshot;
            prev_discrepancy = delta;
            shift = 1;
        } else {
            shift += 1;
        }
    }

    sigma.resize(num_errors + 1, 0);
    sigma
}

/// Chien search over a block of `len` bytes. Returns array indices of errors.
fn error_positions(sigma: &[u8], len: usize) -> Option<Vec<usize>> {
    let expected = sigma.len() - 1;
    let positions: Vec<usize> = (0..len)
        .filter(|&degree| eval_asc(sigma, alpha_pow(-(degree as i64))) == 0)
        .map(|degree| len - 1 - degree)
        .collect();

    (positions.len() == expected).then_some(positions)
}

/// Forney: error magnitude at each position (first consecutive root 0).
fn error_magnitudes(sigma: &[u8], synd: &[u8], positions: &[usize], len: usize) -> Option<Vec<u8>> {
    let nsym = synd.len();

    // omega(x) = S(x) * sigma(x) mod x^nsym
    let mut omega = vec![0u8; nsym];
    for (i, &s) in sigma.iter().enumerate() {
        for (j, &syn) in synd.iter().enumerate() {
            if i + j < nsym {
                omega[i + j] ^= gf_mul(s, syn);
            }
        }
    }

    // Formal derivative: only odd powers survive in characteristic 2.
    let mut sigma_prime = vec![0u8; sigma.len().saturating_sub(1)];
    for i in (1..sigma.len()).step_by(2) {
        sigma_prime[i - 1] = sigma[i];
    }

    positions
        .iter()
        .map(|&pos| {
            let degree = (len - 1 - pos) as i64;
            let x = alpha_pow(degree);
            let x_inv = alpha_pow(-degree);
            let denom = eval_asc(&sigma_prime, x_inv);
            if denom == 0 {
                return None;
            }
            Some(gf_mul(x, gf_mul(eval_asc(&omega, x_inv), gf_inv(denom))))
        })
        .collect()
}

/// Correct one codeword in place, returning the number of fixed bytes.
fn rs_correct_block(block: &mut [u8], nsym: usize) -> Option<usize> {
    let synd = syndromes(block, nsym);
    if synd.iter().all(|&s| s == 0) {
        return Some(0);
    }

    let sigma = error_locator(&synd);
    let num_errors = sigma.len() - 1;
    if num_errors == 0 || 2 * num_errors > nsym {
        return None;
    }

    let positions = error_positions(&sigma, block.len())?;
    let magnitudes = error_magnitudes(&sigma, &synd, &positions, block.len())?;
    for (&pos, &mag) in positions.iter().zip(&magnitudes) {
        block[pos] ^= mag;
    }

    syndromes(block, nsym)
        .iter()
        .all(|&s| s == 0)
        .then_some(num_errors)
}

/// Statistics from decoding all codewords of a payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RsDecodeStats {
    pub num_blocks: usize,
    pub total_errors: usize,
    pub max_block_errors: usize,
}

/// Reed-Solomon decode, reporting how many byte errors were corrected.
pub fn recover_with_stats(data: &[u8], nsym: usize) -> Result<(Vec<u8>, RsDecodeStats), EccError> {
    check_nsym(nsym)?;
    let mut payload = Vec::with_capacity(data.len());
    let mut stats = RsDecodeStats::default();

    for (block_idx, chunk) in data.chunks(config::RS_CODEWORD_LEN).enumerate() {
        if chunk.len() <= nsym {
            return Err(EccError::TruncatedCodeword {
                block: block_idx,
                len: chunk.len(),
                nsym,
            });
        }

        let mut block = chunk.to_vec();
        let fixed = rs_correct_block(&mut block, nsym).ok_or(EccError::TooManyErrors {
            block: block_idx,
            nsym,
        })?;

        stats.num_blocks += 1;
        stats.total_errors += fixed;
        stats.max_block_errors = stats.max_block_errors.max(fixed);
        payload.extend_from_slice(&block[..block.len() - nsym]);
    }

    if stats.total_errors > 0 {
        debug!(
            "reed-solomon corrected {} byte errors across {} codewords",
            stats.total_errors, stats.num_blocks
        );
    }
    Ok((payload, stats))
}

/// Reed-Solomon decode. Fails rather than returning silently corrupted data.
pub fn recover_redundancy(data: &[u8], nsym: usize) -> Result<Vec<u8>, EccError> {
    recover_with_stats(data, nsym).map(|(payload, _)| payload)
}

// --- Replication fallback ---

/// Repeat every byte three times.
pub fn replicate(payload: &[u8]) -> Vec<u8> {
    payload
        .iter()
        .flat_map(|&b| [b; config::REPLICATION_FACTOR])
        .collect()
}

/// Per-byte majority vote over replica triplets; a three-way split keeps the first.
pub fn majority_vote(data: &[u8]) -> Result<(Vec<u8>, usize), EccError> {
    if data.len() % config::REPLICATION_FACTOR != 0 {
        return Err(EccError::ReplicationLength(data.len()));
    }

    let mut corrected = 0;
    let payload: Vec<u8> = data
        .chunks(config::REPLICATION_FACTOR)
        .map(|triplet| {
            let (a, b, c) = (triplet[0], triplet[1], triplet[2]);
            if a != b || b != c {
                corrected += 1;
            }
            if a == b || a == c {
                a
            } else if b == c {
                b
            } else {
                a
            }
        })
        .collect();
    Ok((payload, corrected))
}

// --- Overhead estimates ---

/// Encoded length with `nsym` parity bytes per 255-byte codeword.
pub fn estimate_overhead_rs(payload_len: usize, nsym: usize) -> usize {
    let data_len = config::RS_CODEWORD_LEN.saturating_sub(nsym).max(1);
    payload_len + payload_len.div_ceil(data_len) * nsym
}

pub fn estimate_overhead_replication(payload_len: usize, factor: usize) -> usize {
    payload_len * factor
}
