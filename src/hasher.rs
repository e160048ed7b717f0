//! Sponge primitives used by the generator.
//!
//! Two constructions are supported. `Keccak` is a raw Keccak-f[1600] sponge
//! with a 64-bit rate and the original multi-rate padding. `Skein` absorbs
//! into Skein-512-512 and squeezes through a Threefish-512 PRNG.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use skein::Skein512;
use skein::digest::Digest;
use skein::digest::consts::U64;
use threefish::Threefish512;
use threefish::cipher::BlockEncrypt;
use threefish::cipher::generic_array::GenericArray;
use zeroize::{Zeroize, Zeroizing};

use crate::error::{Error, Result};

/// Keccak rate used for password generation, in bytes (64 bits).
pub const KECCAK_RATE_BYTES: usize = 8;

const KECCAK_STATE_BYTES: usize = 200;
const SKEIN_BLOCK_BYTES: usize = 64;
const SKEIN_TWEAK: [u8; 16] = [0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0x3f];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Algorithm {
    Keccak,
    Skein,
}

impl Algorithm {
    pub fn name(&self) -> &'static str {
        match self {
            Algorithm::Keccak => "keccak",
            Algorithm::Skein => "skein",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Algorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "keccak" => Ok(Algorithm::Keccak),
            "skein" => Ok(Algorithm::Skein),
            other => Err(Error::UnknownMethod(other.to_string())),
        }
    }
}

/// A Keccak-f[1600] sponge with a configurable rate.
pub struct KeccakSponge {
    state: [u64; 25],
    rate: usize,
    position: usize,
    squeezing: bool,
}

impl KeccakSponge {
    pub fn new() -> Self {
        Self::with_rate(KECCAK_RATE_BYTES)
    }

    /// `rate` is in bytes and must be a non-zero multiple of 8 below 200.
    pub fn with_rate(rate: usize) -> Self {
        assert!(
            rate > 0 && rate % 8 == 0 && rate < KECCAK_STATE_BYTES,
            "invalid Keccak rate: {} bytes",
            rate
        );
        Self {
            state: [0; 25],
            rate,
            position: 0,
            squeezing: false,
        }
    }

    fn xor_byte(&mut self, index: usize, byte: u8) {
        self.state[index / 8] ^= (byte as u64) << (8 * (index % 8));
    }

    fn byte_at(&self, index: usize) -> u8 {
        (self.state[index / 8] >> (8 * (index % 8))) as u8
    }

    pub fn absorb(&mut self, input: &[u8]) -> Result<()> {
        if self.squeezing {
            return Err(Error::InvalidState {
                operation: "absorb",
                state: "squeezing",
            });
        }
        for &byte in input {
            self.xor_byte(self.position, byte);
            self.position += 1;
            if self.position == self.rate {
                keccak::f1600(&mut self.state);
                self.position = 0;
            }
        }
        Ok(())
    }

    fn pad_and_switch(&mut self) {
        self.xor_byte(self.position, 0x01);
        self.xor_byte(self.rate - 1, 0x80);
        keccak::f1600(&mut self.state);
        self.position = 0;
        self.squeezing = true;
    }

    pub fn squeeze(&mut self, output: &mut [u8]) {
        if !self.squeezing {
            self.pad_and_switch();
        }
        for out in output.iter_mut() {
            if self.position == self.rate {
                keccak::f1600(&mut self.state);
                self.position = 0;
            }
            *out = self.byte_at(self.position);
            self.position += 1;
        }
    }
}

impl Default for KeccakSponge {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for KeccakSponge {
    fn drop(&mut self) {
        self.state.zeroize();
    }
}

/// Threefish-512 output generator keyed from a finished Skein hash.
struct SkeinPrng {
    cipher: Threefish512,
    buffer: Zeroizing<[u8; SKEIN_BLOCK_BYTES]>,
    remaining: usize,
}

impl SkeinPrng {
    fn new(key: &[u8; SKEIN_BLOCK_BYTES]) -> Self {
        Self {
            cipher: Threefish512::new_with_tweak(key, &SKEIN_TWEAK),
            buffer: Zeroizing::new([0; SKEIN_BLOCK_BYTES]),
            remaining: 0,
        }
    }

    fn refill(&mut self) {
        let mut next_key = GenericArray::clone_from_slice(&[0u8; SKEIN_BLOCK_BYTES]);
        self.cipher.encrypt_block(&mut next_key);

        let mut counter = [0u8; SKEIN_BLOCK_BYTES];
        counter[0] = 1;
        let mut block = GenericArray::clone_from_slice(&counter);
        self.cipher.encrypt_block(&mut block);
        self.buffer.copy_from_slice(&block);
        block.as_mut_slice().zeroize();

        let mut key = Zeroizing::new([0u8; SKEIN_BLOCK_BYTES]);
        key.copy_from_slice(&next_key);
        next_key.as_mut_slice().zeroize();
        self.cipher = Threefish512::new_with_tweak(&key, &SKEIN_TWEAK);
        self.remaining = SKEIN_BLOCK_BYTES;
    }

    fn squeeze(&mut self, output: &mut [u8]) {
        let mut filled = 0;
        while filled < output.len() {
            if self.remaining == 0 {
                self.refill();
            }
            let offset = SKEIN_BLOCK_BYTES - self.remaining;
            let count = self.remaining.min(output.len() - filled);
            output[filled..filled + count].copy_from_slice(&self.buffer[offset..offset + count]);
            self.remaining -= count;
            filled += count;
        }
        // Each call hands back its bytes in reverse order.
        output.reverse();
    }
}

enum SkeinState {
    Absorbing(Skein512<U64>),
    Squeezing(SkeinPrng),
}

pub struct SkeinSponge {
    state: SkeinState,
}

impl SkeinSponge {
    pub fn new() -> Self {
        let mut hasher = Skein512::<U64>::new();
        hasher.update([0u8; SKEIN_BLOCK_BYTES]);
        Self {
            state: SkeinState::Absorbing(hasher),
        }
    }

    pub fn absorb(&mut self, input: &[u8]) -> Result<()> {
        match &mut self.state {
            SkeinState::Absorbing(hasher) => {
                hasher.update(input);
                Ok(())
            }
            SkeinState::Squeezing(_) => Err(Error::InvalidState {
                operation: "absorb",
                state: "squeezing",
            }),
        }
    }

    pub fn squeeze(&mut self, output: &mut [u8]) {
        if let SkeinState::Absorbing(hasher) = &self.state {
            let mut key = Zeroizing::new([0u8; SKEIN_BLOCK_BYTES]);
            key.copy_from_slice(&hasher.clone().finalize());
            self.state = SkeinState::Squeezing(SkeinPrng::new(&key));
        }
        if let SkeinState::Squeezing(prng) = &mut self.state {
            prng.squeeze(output);
        }
    }
}

impl Default for SkeinSponge {
    fn default() -> Self {
        Self::new()
    }
}

/// The sponge selected by an [`Algorithm`].
pub enum Hasher {
    Keccak(KeccakSponge),
    Skein(SkeinSponge),
}

impl Hasher {
    pub fn new(algorithm: Algorithm) -> Self {
        match algorithm {
            Algorithm::Keccak => Hasher::Keccak(KeccakSponge::new()),
            Algorithm::Skein => Hasher::Skein(SkeinSponge::new()),
        }
    }

    pub fn absorb(&mut self, input: &[u8]) -> Result<()> {
        match self {
            Hasher::Keccak(sponge) => sponge.absorb(input),
            Hasher::Skein(sponge) => sponge.absorb(input),
        }
    }

    pub fn squeeze(&mut self, output: &mut [u8]) {
        match self {
            Hasher::Keccak(sponge) => sponge.squeeze(output),
            Hasher::Skein(sponge) => sponge.squeeze(output),
        }
    }
}
