use num_bigint::BigUint;
use tracing::trace;
use zeroize::Zeroizing;

use crate::error::{Error, Result};
use crate::hasher::{Algorithm, Hasher};
use crate::kdf::{KDF_OUTPUT_LEN, Kdf};
use crate::multibase::{MultiBase, required_bytes};

const DELIMITER: &[u8] = b":";
const NULL_ROUND_BYTES: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Inited,
    KdfSelected,
    AbsorbedPassword,
    AbsorbedNulls,
    Squeezing,
}

impl Mode {
    fn name(self) -> &'static str {
        match self {
            Mode::Inited => "initialized",
            Mode::KdfSelected => "waiting for the password (KDF selected)",
            Mode::AbsorbedPassword => "holding the password",
            Mode::AbsorbedNulls => "holding null rounds",
            Mode::Squeezing => "squeezing",
        }
    }
}

/// Deterministic byte stream derived from a password and a site.
///
/// ```text
/// Inited -> AbsorbedPassword -> AbsorbedNulls -> Squeezing
///   v            ^      v                            ^
/// KdfSelected ---'      '----------------------------'
/// ```
pub struct PassacreGenerator {
    mode: Mode,
    algorithm: Algorithm,
    kdf: Option<Kdf>,
    kdf_output: Option<Zeroizing<[u8; KDF_OUTPUT_LEN]>>,
    hasher: Hasher,
}

impl PassacreGenerator {
    pub fn new(algorithm: Algorithm) -> Self {
        Self {
            mode: Mode::Inited,
            algorithm,
            kdf: None,
            kdf_output: None,
            hasher: Hasher::new(algorithm),
        }
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    fn invalid(&self, operation: &'static str) -> Error {
        Error::InvalidState {
            operation,
            state: self.mode.name(),
        }
    }

    /// Routes the password through `kdf` before it is absorbed.
    pub fn use_kdf(&mut self, kdf: Kdf) -> Result<()> {
        if self.mode != Mode::Inited {
            return Err(self.invalid("use_kdf"));
        }
        kdf.validate()?;
        self.kdf = Some(kdf);
        self.mode = Mode::KdfSelected;
        Ok(())
    }

    /// The KDF output absorbed in place of the password, once available.
    pub fn kdf_output(&self) -> Option<&[u8; KDF_OUTPUT_LEN]> {
        self.kdf_output.as_deref()
    }

    pub fn absorb_username_password_site(
        &mut self,
        username: Option<&[u8]>,
        password: &[u8],
        site: &[u8],
    ) -> Result<()> {
        match self.mode {
            Mode::Inited | Mode::KdfSelected => {}
            _ => return Err(self.invalid("absorb_username_password_site")),
        }

        if let Some(kdf) = self.kdf {
            let output = kdf.derive(password, username.unwrap_or_default())?;
            self.hasher.absorb(&output[..])?;
            self.kdf_output = Some(output);
        } else {
            if let Some(username) = username {
                self.hasher.absorb(username)?;
                self.hasher.absorb(DELIMITER)?;
            }
            self.hasher.absorb(password)?;
        }
        self.hasher.absorb(DELIMITER)?;
        self.hasher.absorb(site)?;

        self.mode = Mode::AbsorbedPassword;
        Ok(())
    }

    /// Absorbs `rounds` blocks of 1024 zero bytes.
    pub fn absorb_null_rounds(&mut self, rounds: usize) -> Result<()> {
        match self.mode {
            Mode::AbsorbedPassword | Mode::AbsorbedNulls => {}
            _ => return Err(self.invalid("absorb_null_rounds")),
        }
        let nulls = [0u8; NULL_ROUND_BYTES];
        for _ in 0..rounds {
            self.hasher.absorb(&nulls)?;
        }
        self.mode = Mode::AbsorbedNulls;
        Ok(())
    }

    pub fn squeeze(&mut self, output: &mut [u8]) -> Result<()> {
        match self.mode {
            Mode::AbsorbedPassword | Mode::AbsorbedNulls => self.mode = Mode::Squeezing,
            Mode::Squeezing => {}
            _ => return Err(self.invalid("squeeze")),
        }
        self.hasher.squeeze(output);
        Ok(())
    }

    /// Draws a uniform integer in `[0, max)` by rejection sampling
    /// big-endian chunks of the output stream.
    pub fn squeeze_below(&mut self, max: &BigUint) -> Result<BigUint> {
        let n_bytes = required_bytes(max);
        if n_bytes == 0 {
            return Ok(BigUint::default());
        }

        let mut buffer = Zeroizing::new(vec![0u8; n_bytes]);
        let mut attempts = 0u32;
        loop {
            self.squeeze(&mut buffer)?;
            attempts += 1;
            let candidate = BigUint::from_bytes_be(&buffer);
            if &candidate < max {
                trace!(attempts, n_bytes, "accepted sample");
                return Ok(candidate);
            }
        }
    }
}

/// Squeezes a value for `multibase` and encodes it.
pub fn generate_from_multibase(
    generator: &mut PassacreGenerator,
    multibase: &MultiBase,
) -> Result<Zeroizing<String>> {
    let value = generator.squeeze_below(&multibase.max_encodable_value())?;
    multibase.encode(&value)
}
