use crate::*;
use fhe::bfv::{
    BfvParameters, BfvParametersBuilder, Ciphertext, Encoding, Plaintext, PublicKey, SecretKey,
};
use fhe_traits::{
    Deserialize as FheDeserialize, DeserializeParametrized, FheDecoder, FheDecrypter, FheEncoder,
    FheEncrypter, Serialize as FheSerialize,
};
use rand::rngs::OsRng;
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;
use std::sync::Arc;

/// Largest coefficient modulus the backend accepts, in bits
const MAX_MODULUS_BITS: usize = 62;

/// Maximum total coefficient modulus bits for 128-bit classical security,
/// indexed by polynomial degree.
const SECURITY_BOUNDS: [(usize, usize); 6] = [
    (1024, 27),
    (2048, 54),
    (4096, 109),
    (8192, 218),
    (16384, 438),
    (32768, 881),
];

/// BFV with batch encoding, backed by fhe.rs
pub struct Bfv {
    par: Arc<BfvParameters>,
}

/// A BFV secret key and the seed it was derived from.
///
/// Only the seed is ever persisted.
pub struct BfvSecretKey {
    seed: [u8; 32],
    key: SecretKey,
}

impl Drop for BfvSecretKey {
    fn drop(&mut self) {
        self.seed = [0u8; 32];
    }
}

impl Bfv {
    fn derive_secret_key(&self, seed: [u8; 32]) -> BfvSecretKey {
        let mut rng = ChaCha20Rng::from_seed(seed);
        let key = SecretKey::random(&self.par, &mut rng);
        BfvSecretKey { seed, key }
    }

    /// The plaintext modulus in use
    pub fn plaintext_modulus(&self) -> u64 {
        self.par.plaintext()
    }
}

impl Scheme for Bfv {
    type PublicKey = PublicKey;
    type SecretKey = BfvSecretKey;
    type Plaintext = Plaintext;
    type Ciphertext = Ciphertext;

    fn synthesize(target: &SchemeParameters) -> Result<Self, Error> {
        let degree = target.polynomial_degree;
        if !degree.is_power_of_two() {
            return Err(Error::Configuration(format!(
                "polynomial degree {} is not a power of two",
                degree
            )));
        }

        let plaintext = batching_prime(target.plaintext_modulus_bit_size, degree).ok_or_else(
            || {
                Error::Configuration(format!(
                    "no {}-bit batching prime for degree {}",
                    target.plaintext_modulus_bit_size, degree
                ))
            },
        )?;

        let par = BfvParametersBuilder::new()
            .set_degree(degree)
            .set_plaintext_modulus(plaintext)
            .set_moduli_sizes(&target.coefficient_modulus_chain)
            .build_arc()
            .map_err(|e| Error::Configuration(format!("cannot build parameters: {}", e)))?;

        Ok(Bfv { par })
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        let par = BfvParameters::try_deserialize(bytes)
            .map_err(|e| Error::Configuration(format!("cannot parse parameters: {}", e)))?;
        Ok(Bfv { par: Arc::new(par) })
    }

    fn to_bytes(&self) -> Vec<u8> {
        self.par.to_bytes()
    }

    fn parameters(&self) -> SchemeParameters {
        SchemeParameters {
            polynomial_degree: self.par.degree(),
            coefficient_modulus_chain: self.par.moduli().iter().map(|q| bit_size(*q)).collect(),
            plaintext_modulus_bit_size: bit_size(self.par.plaintext()),
        }
    }

    fn validate(&self) -> Result<(), Error> {
        let params = self.parameters();
        let degree = params.polynomial_degree;

        let bound = SECURITY_BOUNDS
            .iter()
            .find(|(d, _)| *d == degree)
            .map(|(_, bits)| *bits)
            .ok_or_else(|| {
                Error::Configuration(format!("unsupported polynomial degree {}", degree))
            })?;

        if params.coefficient_modulus_chain.is_empty() {
            return Err(Error::Configuration("empty coefficient modulus chain".to_owned()));
        }
        if params.total_modulus_bits() > bound {
            return Err(Error::Configuration(format!(
                "coefficient modulus of {} bits exceeds the {} bit bound for degree {}",
                params.total_modulus_bits(),
                bound,
                degree
            )));
        }
        if let Some(bits) = params
            .coefficient_modulus_chain
            .iter()
            .find(|b| **b > MAX_MODULUS_BITS)
        {
            return Err(Error::Configuration(format!(
                "coefficient modulus of {} bits is too large",
                bits
            )));
        }

        let plaintext = self.par.plaintext();
        if !is_prime(plaintext) || plaintext % (2 * degree as u64) != 1 {
            return Err(Error::Configuration(format!(
                "plaintext modulus {} does not support batching",
                plaintext
            )));
        }
        if self.par.moduli().iter().any(|q| *q <= plaintext) {
            return Err(Error::Configuration(
                "plaintext modulus must be smaller than every coefficient modulus".to_owned(),
            ));
        }

        Ok(())
    }

    fn generate_keys(&self) -> Result<(BfvSecretKey, PublicKey), Error> {
        let mut seed = [0u8; 32];
        OsRng.fill_bytes(&mut seed);
        let secret = self.derive_secret_key(seed);
        let public = PublicKey::new(&secret.key, &mut OsRng);
        Ok((secret, public))
    }

    fn public_key_to_bytes(&self, key: &PublicKey) -> Vec<u8> {
        key.to_bytes()
    }

    fn public_key_from_bytes(&self, bytes: &[u8]) -> Result<PublicKey, Error> {
        <PublicKey as DeserializeParametrized>::from_bytes(bytes, &self.par)
            .map_err(|e| Error::KeyMaterial(format!("cannot parse public key: {}", e)))
    }

    fn secret_key_to_bytes(&self, key: &BfvSecretKey) -> Vec<u8> {
        key.seed.to_vec()
    }

    fn secret_key_from_bytes(&self, bytes: &[u8]) -> Result<BfvSecretKey, Error> {
        if bytes.len() != 32 {
            return Err(Error::KeyMaterial(format!(
                "secret key seed has {} bytes, expected 32",
                bytes.len()
            )));
        }
        let mut seed = [0u8; 32];
        seed.copy_from_slice(bytes);
        Ok(self.derive_secret_key(seed))
    }

    fn encode(&self, values: &[u64]) -> Result<Plaintext, Error> {
        if values.len() > self.par.degree() {
            return Err(Error::InvalidBallot(format!(
                "{} values do not fit in {} slots",
                values.len(),
                self.par.degree()
            )));
        }
        if values.iter().any(|v| *v >= self.par.plaintext()) {
            return Err(Error::InvalidBallot(
                "value exceeds the plaintext modulus".to_owned(),
            ));
        }
        Plaintext::try_encode(values, Encoding::simd(), &self.par)
            .map_err(|e| Error::Backend(e.to_string()))
    }

    fn decode(&self, plaintext: &Plaintext) -> Result<Vec<u64>, Error> {
        Vec::<u64>::try_decode(plaintext, Encoding::simd())
            .map_err(|e| Error::Decode(format!("cannot decode plaintext: {}", e)))
    }

    fn encrypt(&self, plaintext: &Plaintext, key: &PublicKey) -> Result<Ciphertext, Error> {
        key.try_encrypt(plaintext, &mut OsRng)
            .map_err(|e| Error::Backend(e.to_string()))
    }

    fn decrypt(&self, ciphertext: &Ciphertext, key: &BfvSecretKey) -> Result<Plaintext, Error> {
        key.key
            .try_decrypt(ciphertext)
            .map_err(|e| Error::Backend(e.to_string()))
    }

    fn add(&self, a: &Ciphertext, b: &Ciphertext) -> Result<Ciphertext, Error> {
        // fhe.rs asserts on these rather than returning an error
        if a.level != b.level || a.c.len() != b.c.len() {
            return Err(Error::Backend(format!(
                "ciphertext shapes differ: level {} / {} polys vs level {} / {} polys",
                a.level,
                a.c.len(),
                b.level,
                b.c.len()
            )));
        }
        Ok(a + b)
    }

    fn ciphertext_to_bytes(&self, ciphertext: &Ciphertext) -> Vec<u8> {
        ciphertext.to_bytes()
    }

    fn ciphertext_from_bytes(&self, bytes: &[u8]) -> Result<Ciphertext, Error> {
        <Ciphertext as DeserializeParametrized>::from_bytes(bytes, &self.par)
            .map_err(|e| Error::Decode(e.to_string()))
    }
}

fn bit_size(value: u64) -> usize {
    (64 - value.leading_zeros()) as usize
}

/// Largest prime `p` of exactly `bits` bits with `p ≡ 1 mod 2·degree`
fn batching_prime(bits: usize, degree: usize) -> Option<u64> {
    if bits < 2 || bits > MAX_MODULUS_BITS || degree == 0 {
        return None;
    }
    let step = 2 * degree as u64;
    let upper = 1u64 << bits;
    let lower = 1u64 << (bits - 1);

    let mut k = (upper - 2) / step;
    while k > 0 {
        let candidate = k * step + 1;
        if candidate < lower {
            return None;
        }
        if is_prime(candidate) {
            return Some(candidate);
        }
        k -= 1;
    }
    None
}

fn mod_mul(a: u64, b: u64, m: u64) -> u64 {
    ((a as u128 * b as u128) % m as u128) as u64
}

fn mod_pow(mut base: u64, mut exp: u64, m: u64) -> u64 {
    let mut result = 1u64;
    base %= m;
    while exp > 0 {
        if exp & 1 == 1 {
            result = mod_mul(result, base, m);
        }
        exp >>= 1;
        base = mod_mul(base, base, m);
    }
    result
}

/// Deterministic Miller-Rabin, exact for every u64
fn is_prime(n: u64) -> bool {
    const WITNESSES: [u64; 12] = [2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37];

    if n < 2 {
        return false;
    }
    for p in WITNESSES.iter() {
        if n % p == 0 {
            return n == *p;
        }
    }

    let mut d = n - 1;
    let mut s = 0;
    while d % 2 == 0 {
        d /= 2;
        s += 1;
    }

    'witness: for a in WITNESSES.iter() {
        let mut x = mod_pow(*a, d, n);
        if x == 1 || x == n - 1 {
            continue;
        }
        for _ in 1..s {
            x = mod_mul(x, x, n);
            if x == n - 1 {
                continue 'witness;
            }
        }
        return false;
    }
    true
}
