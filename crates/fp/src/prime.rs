use std::{fmt, num::ParseIntError, str::FromStr};

use serde::{de::Error as _, Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

pub const TWO: ValidPrime = ValidPrime::new(2);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PrimeError {
    #[error("Not an integer: {0}")]
    NotAnInteger(#[from] ParseIntError),
    #[error("{0} is not a valid prime")]
    InvalidPrime(u32),
}

/// The characteristic of the field a computation runs over. Every [`Matrix`](crate::matrix::Matrix)
/// remembers its prime, and binary operations check that the primes agree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ValidPrime {
    p: u32,
}

pub const fn is_prime(p: u32) -> bool {
    if p < 2 {
        return false;
    }
    // (2..p).all(|k| p % k != 0), but make it const
    let mut k = 2;
    while k * k <= p {
        if p % k == 0 {
            return false;
        }
        k += 1;
    }
    true
}

impl ValidPrime {
    pub const fn new(p: u32) -> Self {
        // Products of two residues are computed in u64, so any p below 2^31 is safe.
        assert!(p < (1 << 31), "Tried to construct a prime larger than 2^31");
        assert!(is_prime(p), "Tried to construct a composite dynamic prime");
        Self { p }
    }

    pub const fn as_u32(self) -> u32 {
        self.p
    }

    pub const fn as_usize(self) -> usize {
        self.p as usize
    }

    /// Reduces an arbitrary signed integer to its residue in `0..p`.
    pub fn reduce(self, n: i64) -> u32 {
        n.rem_euclid(self.p as i64) as u32
    }

    /// Computes the sum mod p. This takes care of overflow.
    pub fn sum(self, n1: u32, n2: u32) -> u32 {
        ((n1 as u64 + n2 as u64) % self.p as u64) as u32
    }

    /// Computes the product mod p. This takes care of overflow.
    pub fn product(self, n1: u32, n2: u32) -> u32 {
        ((n1 as u64 * n2 as u64) % self.p as u64) as u32
    }

    pub fn negate(self, n: u32) -> u32 {
        if n == 0 {
            0
        } else {
            self.p - n
        }
    }

    pub fn pow_mod(self, mut b: u32, mut e: u32) -> u32 {
        let mut result: u32 = 1 % self.p;
        while e > 0 {
            if (e & 1) == 1 {
                result = self.product(result, b);
            }
            b = self.product(b, b);
            e >>= 1;
        }
        result
    }

    /// The multiplicative inverse of a nonzero residue, by Fermat's little theorem.
    pub fn inverse(self, k: u32) -> u32 {
        assert!(k > 0 && k < self.p);
        self.pow_mod(k, self.p - 2)
    }

    /// The residue of $(-1)^n$.
    pub fn minus_one_to_the_n(self, n: i32) -> u32 {
        if n % 2 == 0 {
            1
        } else {
            self.p - 1
        }
    }
}

impl std::ops::Deref for ValidPrime {
    type Target = u32;

    fn deref(&self) -> &u32 {
        &self.p
    }
}

impl PartialEq<u32> for ValidPrime {
    fn eq(&self, other: &u32) -> bool {
        self.p == *other
    }
}

impl From<ValidPrime> for u32 {
    fn from(value: ValidPrime) -> u32 {
        value.p
    }
}

impl TryFrom<u32> for ValidPrime {
    type Error = PrimeError;

    fn try_from(p: u32) -> Result<Self, PrimeError> {
        if p < (1 << 31) && is_prime(p) {
            Ok(Self { p })
        } else {
            Err(PrimeError::InvalidPrime(p))
        }
    }
}

impl FromStr for ValidPrime {
    type Err = PrimeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let p: u32 = s.parse()?;
        Self::try_from(p)
    }
}

impl fmt::Display for ValidPrime {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        <u32 as fmt::Display>::fmt(&self.p, f)
    }
}

impl Serialize for ValidPrime {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.p.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ValidPrime {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let p: u32 = u32::deserialize(deserializer)?;
        Self::try_from(p).map_err(D::Error::custom)
    }
}

#[cfg(feature = "proptest")]
impl proptest::arbitrary::Arbitrary for ValidPrime {
    type Parameters = ();
    type Strategy = proptest::sample::Select<Self>;

    fn arbitrary_with(_args: Self::Parameters) -> Self::Strategy {
        proptest::sample::select(
            [2, 3, 5, 7, 11, 13]
                .into_iter()
                .map(Self::new)
                .collect::<Vec<_>>(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validprime_test() {
        for p in (0..(1 << 12)).filter(|&p| is_prime(p)) {
            assert_eq!(ValidPrime::new(p), p);
        }
        assert!(!is_prime(0));
        assert!(!is_prime(1));
        assert!(!is_prime(91));
    }

    #[test]
    fn validprime_invalid() {
        assert_eq!(
            ValidPrime::try_from(4).unwrap_err(),
            PrimeError::InvalidPrime(4)
        );
        assert_eq!(
            "4".parse::<ValidPrime>().unwrap_err(),
            PrimeError::InvalidPrime(4)
        );
        assert_eq!(
            "4.0".parse::<ValidPrime>().unwrap_err(),
            PrimeError::NotAnInteger("4.0".parse::<u32>().unwrap_err())
        );
    }

    #[test]
    fn inverse_test() {
        for p in [2, 3, 5, 7, 11, 13, 101] {
            let p = ValidPrime::new(p);
            for k in 1..*p {
                assert_eq!(p.product(p.inverse(k), k), 1);
            }
        }
    }

    #[test]
    fn reduce_negative() {
        let p = ValidPrime::new(5);
        assert_eq!(p.reduce(-1), 4);
        assert_eq!(p.reduce(-10), 0);
        assert_eq!(p.reduce(12), 2);
        assert_eq!(p.minus_one_to_the_n(-3), 4);
    }

    #[test]
    fn serde_rejects_composites() {
        assert!(serde_json::from_str::<ValidPrime>("6").is_err());
        assert_eq!(serde_json::from_str::<ValidPrime>("7").unwrap(), 7);
    }
}
