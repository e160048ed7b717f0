//! Mixed-radix encoding of integers into passwords.
//!
//! A [`MultiBase`] is a sequence of [`Base`]s. Each base contributes one
//! output unit (a character, a word or a fixed separator), and the integer
//! is spread across them with the last base as the least significant digit.
//! Shuffled multibases also spend `k!` of the integer's range on permuting
//! the `k` output units.

use std::collections::HashSet;
use std::sync::Arc;

use num_bigint::BigUint;
use num_traits::{One, ToPrimitive, Zero};
use zeroize::Zeroizing;

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Base {
    digits: Arc<[String]>,
}

impl Base {
    pub fn new(digits: impl Into<Arc<[String]>>) -> Result<Self> {
        let digits = digits.into();
        if digits.is_empty() {
            return Err(Error::Schema("a base needs at least one digit".to_string()));
        }
        let mut seen = HashSet::with_capacity(digits.len());
        for digit in digits.iter() {
            if digit.is_empty() {
                return Err(Error::Schema("base digits cannot be empty".to_string()));
            }
            if !seen.insert(digit.as_str()) {
                return Err(Error::Schema(format!("duplicate digit {:?} in base", digit)));
            }
        }
        Ok(Self { digits })
    }

    /// A fixed string that always appears in the output.
    pub fn separator(text: &str) -> Result<Self> {
        Self::new(vec![text.to_string()])
    }

    /// One digit per character of `chars`.
    pub fn characters(chars: &str) -> Result<Self> {
        Self::new(chars.chars().map(String::from).collect::<Vec<_>>())
    }

    pub fn radix(&self) -> usize {
        self.digits.len()
    }

    pub fn digits(&self) -> &[String] {
        &self.digits
    }

    pub fn is_separator(&self) -> bool {
        self.digits.len() == 1
    }

    fn position(&self, unit: &str) -> Option<usize> {
        self.digits.iter().position(|d| d == unit)
    }
}

#[derive(Debug, Clone, Default)]
pub struct MultiBase {
    bases: Vec<Base>,
    shuffle: bool,
}

impl MultiBase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, base: Base) {
        self.bases.push(base);
    }

    pub fn enable_shuffle(&mut self) {
        self.shuffle = true;
    }

    pub fn is_shuffled(&self) -> bool {
        self.shuffle
    }

    pub fn bases(&self) -> &[Base] {
        &self.bases
    }

    pub fn len(&self) -> usize {
        self.bases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bases.is_empty()
    }

    fn permutations(&self) -> BigUint {
        if self.shuffle {
            factorial(self.bases.len())
        } else {
            BigUint::one()
        }
    }

    /// One past the largest integer [`encode`](Self::encode) accepts.
    pub fn max_encodable_value(&self) -> BigUint {
        self.bases
            .iter()
            .fold(self.permutations(), |acc, base| acc * BigUint::from(base.radix() as u64))
    }

    /// Bytes of generator output needed per sampling attempt.
    pub fn required_bytes(&self) -> usize {
        required_bytes(&self.max_encodable_value())
    }

    pub fn entropy_bits(&self) -> f64 {
        log2(&self.max_encodable_value())
    }

    pub fn encode(&self, value: &BigUint) -> Result<Zeroizing<String>> {
        let max = self.max_encodable_value();
        if value >= &max {
            return Err(Error::Encode(format!(
                "value needs {} bits but the schema only encodes {:.1}",
                value.bits(),
                log2(&max)
            )));
        }

        let mut n = value.clone();
        let mut permutation = BigUint::zero();
        if self.shuffle {
            let permutations = self.permutations();
            permutation = &n % &permutations;
            n /= &permutations;
        }

        let mut units: Vec<&str> = Vec::with_capacity(self.bases.len());
        for base in self.bases.iter().rev() {
            let radix = BigUint::from(base.radix() as u64);
            let digit = take_digit(&mut n, &radix)?;
            units.push(&base.digits[digit]);
        }
        units.reverse();

        if self.shuffle {
            for i in (1..units.len()).rev() {
                let modulus = BigUint::from(i as u64 + 1);
                let j = take_digit(&mut permutation, &modulus)?;
                units.swap(i, j);
            }
        }

        Ok(Zeroizing::new(units.concat()))
    }

    /// Recovers the integer behind a sequence of output units.
    pub fn decode<S: AsRef<str>>(&self, units: &[S]) -> Result<BigUint> {
        if self.shuffle {
            return Err(Error::Encode(
                "shuffled output cannot be decoded unambiguously".to_string(),
            ));
        }
        if units.len() != self.bases.len() {
            return Err(Error::Encode(format!(
                "expected {} units, got {}",
                self.bases.len(),
                units.len()
            )));
        }

        let mut n = BigUint::zero();
        for (index, (base, unit)) in self.bases.iter().zip(units).enumerate() {
            let digit = base.position(unit.as_ref()).ok_or_else(|| {
                Error::Encode(format!("unit {} ({:?}) is not in its base", index, unit.as_ref()))
            })?;
            n = n * BigUint::from(base.radix() as u64) + BigUint::from(digit as u64);
        }
        Ok(n)
    }
}

fn take_digit(n: &mut BigUint, radix: &BigUint) -> Result<usize> {
    let digit = (&*n % radix)
        .to_usize()
        .ok_or_else(|| Error::Encode("digit does not fit in usize".to_string()))?;
    *n /= radix;
    Ok(digit)
}

fn factorial(k: usize) -> BigUint {
    (2..=k as u64).fold(BigUint::one(), |acc, i| acc * BigUint::from(i))
}

pub(crate) fn required_bytes(max: &BigUint) -> usize {
    if max <= &BigUint::one() {
        return 0;
    }
    let bits = (max - BigUint::one()).bits() as usize;
    bits.div_ceil(8).max(1)
}

pub(crate) fn log2(n: &BigUint) -> f64 {
    let bits = n.bits();
    if bits == 0 {
        return f64::NEG_INFINITY;
    }
    if bits <= 64 {
        return n.to_u64().map_or(f64::NAN, |v| (v as f64).log2());
    }
    let shift = bits - 64;
    let top = (n >> shift as usize).to_u64().map_or(f64::NAN, |v| v as f64);
    top.log2() + shift as f64
}
