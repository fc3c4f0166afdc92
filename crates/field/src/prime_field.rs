// Copyright 2023-2025 Irreducible Inc.

use std::fmt::{self, Display};

use num_bigint::{BigInt, BigUint, RandBigInt, Sign};
use num_integer::Integer;
use num_traits::{One, Zero};
use rand::RngCore;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::error::Error;

/// Decimal expansion of the BN254 scalar field modulus, the default prime of Circom.
pub const BN254_SCALAR_MODULUS: &str =
	"21888242871839275222246405745257275088548364400416034343698204186575808495617";

/// Witness bases for the Miller-Rabin test. Deterministic below 3.3 * 10^24.
const MILLER_RABIN_BASES: [u32; 12] = [2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37];

/// An element of a prime field, stored as its canonical residue.
///
/// Elements carry no reference to their field; arithmetic is performed through the owning
/// [`PrimeField`]. Mixing elements of different fields is a logic error.
///
/// Serialized as a decimal string, the convention of Circom's JSON artifacts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fp(BigUint);

impl Fp {
	pub fn zero() -> Self {
		Self(BigUint::zero())
	}

	pub fn one() -> Self {
		Self(BigUint::one())
	}

	pub fn is_zero(&self) -> bool {
		self.0.is_zero()
	}

	pub fn is_one(&self) -> bool {
		self.0.is_one()
	}

	/// The canonical residue in `[0, p)`.
	pub const fn value(&self) -> &BigUint {
		&self.0
	}

	pub fn into_value(self) -> BigUint {
		self.0
	}

	/// Returns the residue as a `u64` if it fits.
	pub fn to_u64(&self) -> Option<u64> {
		u64::try_from(&self.0).ok()
	}
}

impl Display for Fp {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl Serialize for Fp {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.serialize_str(&self.0.to_str_radix(10))
	}
}

impl<'de> Deserialize<'de> for Fp {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		let literal = String::deserialize(deserializer)?;
		literal
			.parse::<BigUint>()
			.map(Fp)
			.map_err(|_| de::Error::custom(format!("invalid field element '{literal}'")))
	}
}

/// The prime field `Z/pZ`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PrimeField {
	modulus: BigUint,
	half_modulus: BigUint,
}

impl PrimeField {
	/// Creates the field of the given prime order.
	///
	/// ## Throws
	///
	/// * [`Error::ModulusTooSmall`] if `modulus < 2`
	/// * [`Error::NotPrime`] if `modulus` fails a Miller-Rabin test
	pub fn new(modulus: BigUint) -> Result<Self, Error> {
		if modulus < BigUint::from(2u32) {
			return Err(Error::ModulusTooSmall { modulus });
		}
		if !is_probable_prime(&modulus) {
			return Err(Error::NotPrime { modulus });
		}
		let half_modulus = &modulus >> 1;
		Ok(Self {
			modulus,
			half_modulus,
		})
	}

	/// Creates the field from a decimal modulus, as found in compiler artifacts.
	pub fn from_decimal(modulus: &str) -> Result<Self, Error> {
		let modulus = modulus
			.trim()
			.parse::<BigUint>()
			.map_err(|_| Error::InvalidLiteral {
				literal: modulus.to_string(),
			})?;
		Self::new(modulus)
	}

	/// The BN254 scalar field.
	pub fn bn254() -> Self {
		let modulus = BN254_SCALAR_MODULUS
			.parse::<BigUint>()
			.expect("constant is a valid decimal literal");
		let half_modulus = &modulus >> 1;
		Self {
			modulus,
			half_modulus,
		}
	}

	pub const fn modulus(&self) -> &BigUint {
		&self.modulus
	}

	/// Number of bits of the modulus.
	pub fn bits(&self) -> u64 {
		self.modulus.bits()
	}

	pub fn zero(&self) -> Fp {
		Fp::zero()
	}

	pub fn one(&self) -> Fp {
		Fp::one()
	}

	pub fn from_u64(&self, value: u64) -> Fp {
		self.reduce(BigUint::from(value))
	}

	pub fn from_i64(&self, value: i64) -> Fp {
		self.from_bigint(&BigInt::from(value))
	}

	/// Reduces an arbitrary unsigned integer into the field.
	pub fn reduce(&self, value: BigUint) -> Fp {
		if value < self.modulus {
			Fp(value)
		} else {
			Fp(value % &self.modulus)
		}
	}

	/// Reduces an arbitrary signed integer into the field.
	pub fn from_bigint(&self, value: &BigInt) -> Fp {
		let modulus = BigInt::from_biguint(Sign::Plus, self.modulus.clone());
		let residue = value.mod_floor(&modulus);
		Fp(residue
			.to_biguint()
			.expect("mod_floor by a positive modulus is non-negative"))
	}

	/// Parses a (possibly negative) decimal literal and reduces it into the field.
	pub fn parse(&self, literal: &str) -> Result<Fp, Error> {
		let value = literal
			.trim()
			.parse::<BigInt>()
			.map_err(|_| Error::InvalidLiteral {
				literal: literal.to_string(),
			})?;
		Ok(self.from_bigint(&value))
	}

	/// The representative of `a` in `(-p/2, p/2]`, convenient for printing coefficients.
	pub fn signed(&self, a: &Fp) -> BigInt {
		if a.0 > self.half_modulus {
			-BigInt::from_biguint(Sign::Plus, &self.modulus - &a.0)
		} else {
			BigInt::from_biguint(Sign::Plus, a.0.clone())
		}
	}

	pub fn add(&self, a: &Fp, b: &Fp) -> Fp {
		let sum = &a.0 + &b.0;
		if sum >= self.modulus {
			Fp(sum - &self.modulus)
		} else {
			Fp(sum)
		}
	}

	pub fn sub(&self, a: &Fp, b: &Fp) -> Fp {
		if a.0 >= b.0 {
			Fp(&a.0 - &b.0)
		} else {
			Fp(&self.modulus - &b.0 + &a.0)
		}
	}

	pub fn neg(&self, a: &Fp) -> Fp {
		if a.is_zero() {
			Fp::zero()
		} else {
			Fp(&self.modulus - &a.0)
		}
	}

	pub fn mul(&self, a: &Fp, b: &Fp) -> Fp {
		Fp((&a.0 * &b.0) % &self.modulus)
	}

	pub fn square(&self, a: &Fp) -> Fp {
		self.mul(a, a)
	}

	pub fn pow(&self, a: &Fp, exp: &BigUint) -> Fp {
		Fp(a.0.modpow(exp, &self.modulus))
	}

	pub fn pow_u64(&self, a: &Fp, exp: u64) -> Fp {
		self.pow(a, &BigUint::from(exp))
	}

	/// Computes the multiplicative inverse, or `None` for zero.
	pub fn inverse(&self, a: &Fp) -> Option<Fp> {
		if a.is_zero() {
			return None;
		}
		let exp = &self.modulus - 2u32;
		Some(self.pow(a, &exp))
	}

	/// Computes `a / b`.
	///
	/// ## Throws
	///
	/// * [`Error::DivisionByZero`] if `b` is zero
	pub fn div(&self, a: &Fp, b: &Fp) -> Result<Fp, Error> {
		let inv = self.inverse(b).ok_or(Error::DivisionByZero)?;
		Ok(self.mul(a, &inv))
	}

	/// Returns an element chosen uniformly at random.
	pub fn random(&self, mut rng: impl RngCore) -> Fp {
		Fp(rng.gen_biguint_below(&self.modulus))
	}

	/// Returns `(p - 1) / 2`, the exponent of the quadratic character.
	pub fn half_order(&self) -> BigUint {
		(&self.modulus - 1u32) >> 1
	}

	/// Whether `a` is a canonical residue of this field.
	pub fn contains(&self, a: &Fp) -> bool {
		a.0 < self.modulus
	}
}

impl Default for PrimeField {
	fn default() -> Self {
		Self::bn254()
	}
}

impl Display for PrimeField {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "GF({})", self.modulus)
	}
}

/// Miller-Rabin primality test with fixed bases.
pub fn is_probable_prime(n: &BigUint) -> bool {
	let two = BigUint::from(2u32);
	if n < &two {
		return false;
	}
	for &base in &MILLER_RABIN_BASES {
		let base = BigUint::from(base);
		if n == &base {
			return true;
		}
		if (n % &base).is_zero() {
			return false;
		}
	}

	let n_minus_one = n - 1u32;
	let shift = n_minus_one
		.trailing_zeros()
		.expect("n - 1 is non-zero for n > 2");
	let d = &n_minus_one >> shift;

	'witness: for &base in &MILLER_RABIN_BASES {
		let mut x = BigUint::from(base).modpow(&d, n);
		if x.is_one() || x == n_minus_one {
			continue;
		}
		for _ in 1..shift {
			x = x.modpow(&two, n);
			if x == n_minus_one {
				continue 'witness;
			}
		}
		return false;
	}
	true
}
