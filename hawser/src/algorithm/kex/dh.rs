//! Modular-exponentiation groups of the classic Diffie-Hellman exchanges.

use num_bigint::{BigUint, RandBigInt};
use num_traits::One;

use crate::{wire::arch::MpInt, Error, Result};

/// The 1024-bit MODP group from RFC 2409 § 6.2, `diffie-hellman-group1`.
const GROUP_1_P: &str = "FFFFFFFFFFFFFFFFC90FDAA22168C234C4C6628B80DC1CD1\
29024E088A67CC74020BBEA63B139B22514A08798E3404DD\
EF9519B3CD3A431B302B0A6DF25F14374FE1356D6D51C245\
E485B576625E7EC6F44C42E9A637ED6B0BFF5CB6F406B7ED\
EE386BFB5A899FA5AE9F24117C4B1FE649286651ECE65381\
FFFFFFFFFFFFFFFF";

/// The 2048-bit MODP group from RFC 3526 § 3, `diffie-hellman-group14`.
const GROUP_14_P: &str = "FFFFFFFFFFFFFFFFC90FDAA22168C234C4C6628B80DC1CD1\
29024E088A67CC74020BBEA63B139B22514A08798E3404DD\
EF9519B3CD3A431B302B0A6DF25F14374FE1356D6D51C245\
E485B576625E7EC6F44C42E9A637ED6B0BFF5CB6F406B7ED\
EE386BFB5A899FA5AE9F24117C4B1FE649286651ECE45B3D\
C2007CB8A163BF0598DA48361C55D39A69163FA8FD24CF5F\
83655D23DCA3AD961C62F356208552BB9ED529077096966D\
670C354E4ABC9804F1746C08CA18217C32905E462E36CE3B\
E39E772C180E86039B2783A2EC07A28FB5C55DF06F4C52C9\
DE2BCBF6955817183995497CEA956AE515D2261898FA0510\
15728E5A8AACAA68FFFFFFFFFFFFFFFF";

/// A safe prime and its generator.
pub(crate) struct Group {
    pub p: BigUint,
    pub g: BigUint,
}

impl Group {
    pub fn group1() -> Self {
        Self {
            p: BigUint::parse_bytes(GROUP_1_P.as_bytes(), 16)
                .expect("The well-known group constant failed to parse"),
            g: BigUint::from(2u32),
        }
    }

    pub fn group14() -> Self {
        Self {
            p: BigUint::parse_bytes(GROUP_14_P.as_bytes(), 16)
                .expect("The well-known group constant failed to parse"),
            g: BigUint::from(2u32),
        }
    }

    /// Size of the prime, in bits.
    pub fn bits(&self) -> u64 {
        self.p.bits()
    }

    /// Generate a private exponent in `[2, (p - 1) / 2)` (RFC 4253 § 8).
    pub fn generate_secret(&self) -> BigUint {
        let mut rng = rand::thread_rng();

        rng.gen_biguint_range(&BigUint::from(2u32), &(&self.p >> 1))
    }

    /// Compute our public exchange value, `g^x mod p`.
    pub fn exchange_value(&self, x: &BigUint) -> BigUint {
        self.g.modpow(x, &self.p)
    }

    /// Reject peer public values outside of `(1, p - 1)`.
    pub fn validate(&self, public: &BigUint) -> Result<()> {
        if *public <= BigUint::one() || *public >= &self.p - 1u32 {
            Err(Error::KexError)
        } else {
            Ok(())
        }
    }

    /// Compute the shared secret, `public^x mod p`.
    pub fn shared_secret(&self, public: &BigUint, x: &BigUint) -> BigUint {
        public.modpow(x, &self.p)
    }
}

/// The `mpint` wire form of an unsigned big integer.
pub(crate) fn to_mpint(value: &BigUint) -> MpInt {
    MpInt::positive(&value.to_bytes_be())
}

/// The unsigned big integer behind an `mpint` wire value.
pub(crate) fn from_mpint(value: &MpInt) -> BigUint {
    BigUint::from_bytes_be(value.as_positive_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn groups_have_expected_sizes() {
        assert_eq!(Group::group1().bits(), 1024);
        assert_eq!(Group::group14().bits(), 2048);
    }

    #[test]
    fn exchange_agrees_on_the_secret() {
        let group = Group::group14();

        let x = group.generate_secret();
        let y = group.generate_secret();

        let e = group.exchange_value(&x);
        let f = group.exchange_value(&y);

        group.validate(&e).unwrap();
        group.validate(&f).unwrap();

        assert_eq!(group.shared_secret(&f, &x), group.shared_secret(&e, &y));
    }

    #[test]
    fn trivial_public_values_are_rejected() {
        let group = Group::group14();

        assert!(group.validate(&BigUint::one()).is_err());
        assert!(group.validate(&(&group.p - 1u32)).is_err());
        assert!(group.validate(&BigUint::from(2u32)).is_ok());
    }

    #[test]
    fn mpint_conversion_roundtrips() {
        let value = BigUint::from(0xdeadbeefu32);

        assert_eq!(from_mpint(&to_mpint(&value)), value);
    }
}
