use argon2::{Algorithm, Argon2, Params, Version};
use blake2::{Blake2b512, Digest};
use serde::{Deserialize, Serialize};
use tracing::debug;
use zeroize::Zeroizing;

use crate::error::{Error, Result};

/// Size of the keying material every KDF produces.
pub const KDF_OUTPUT_LEN: usize = 64;

const MIN_SALT_LEN: usize = 16;
const MAX_SCRYPT_LOG_N: u32 = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScryptConfig {
    pub n: u64,
    pub r: u32,
    pub p: u32,
}

impl ScryptConfig {
    pub const DEFAULT: Self = Self {
        n: 1 << 15,
        r: 8,
        p: 1,
    };

    fn log_n(&self) -> Result<u8> {
        if self.n < 2 || !self.n.is_power_of_two() {
            return Err(Error::Kdf(format!(
                "scrypt n must be a power of two greater than 1, got {}",
                self.n
            )));
        }
        let log_n = self.n.trailing_zeros();
        if log_n > MAX_SCRYPT_LOG_N {
            return Err(Error::Kdf(format!(
                "scrypt n must be at most 2^{}, got 2^{}",
                MAX_SCRYPT_LOG_N, log_n
            )));
        }
        Ok(log_n as u8)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Argon2Config {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Argon2Config {
    pub const STANDARD: Self = Self {
        memory_kib: 64 * 1024,
        iterations: 16,
        parallelism: 6,
    };

    pub const PARANOID: Self = Self {
        memory_kib: 128 * 1024,
        iterations: 32,
        parallelism: 6,
    };

    pub fn memory_mib(&self) -> u32 {
        self.memory_kib / 1024
    }
}

/// Memory-hard stretching applied to the password before it reaches the sponge.
///
/// The password is the KDF input and the username (possibly empty) is the salt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Kdf {
    Scrypt(ScryptConfig),
    Argon2(Argon2Config),
}

impl Kdf {
    pub fn name(&self) -> &'static str {
        match self {
            Kdf::Scrypt(_) => "scrypt",
            Kdf::Argon2(_) => "argon2id",
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Kdf::Scrypt(c) => format!("scrypt (n={}, r={}, p={})", c.n, c.r, c.p),
            Kdf::Argon2(c) => format!(
                "Argon2id (m={} MiB, t={}, p={})",
                c.memory_mib(),
                c.iterations,
                c.parallelism
            ),
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            Kdf::Scrypt(config) => scrypt_params(config).map(|_| ()),
            Kdf::Argon2(config) => argon2_params(config).map(|_| ()),
        }
    }

    pub fn derive(&self, password: &[u8], salt: &[u8]) -> Result<Zeroizing<[u8; KDF_OUTPUT_LEN]>> {
        let mut output = Zeroizing::new([0u8; KDF_OUTPUT_LEN]);
        debug!(kdf = self.name(), salt_len = salt.len(), "running KDF");
        match self {
            Kdf::Scrypt(config) => {
                let params = scrypt_params(config)?;
                scrypt::scrypt(password, salt, &params, &mut output[..])
                    .map_err(|e| Error::Kdf(format!("scrypt derivation failed: {}", e)))?;
            }
            Kdf::Argon2(config) => {
                let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon2_params(config)?);
                let salt = stretch_salt(salt);
                argon2
                    .hash_password_into(password, &salt, &mut output[..])
                    .map_err(|e| Error::Kdf(format!("Argon2 derivation failed: {:?}", e)))?;
            }
        }
        Ok(output)
    }
}

fn scrypt_params(config: &ScryptConfig) -> Result<scrypt::Params> {
    scrypt::Params::new(config.log_n()?, config.r, config.p, KDF_OUTPUT_LEN)
        .map_err(|e| Error::Kdf(format!("invalid scrypt parameters: {}", e)))
}

fn argon2_params(config: &Argon2Config) -> Result<Params> {
    Params::new(
        config.memory_kib,
        config.iterations,
        config.parallelism,
        Some(KDF_OUTPUT_LEN),
    )
    .map_err(|e| Error::Kdf(format!("invalid Argon2 parameters: {:?}", e)))
}

fn stretch_salt(salt: &[u8]) -> Zeroizing<Vec<u8>> {
    if salt.len() >= MIN_SALT_LEN {
        Zeroizing::new(salt.to_vec())
    } else {
        let mut hasher = Blake2b512::new();
        hasher.update(salt);
        Zeroizing::new(hasher.finalize().to_vec())
    }
}
