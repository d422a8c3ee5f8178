use crate::*;

/// The capability set the tally engine needs from an additively homomorphic
/// encryption scheme.
///
/// A value implementing `Scheme` is a built arithmetic context for one
/// parameter set. Everything above this trait (stage gating, accumulation,
/// key lifecycle) is independent of the lattice arithmetic behind it.
pub trait Scheme: Sized {
    type PublicKey;
    type SecretKey;
    type Plaintext;
    type Ciphertext;

    /// Build a fresh context from a target configuration
    fn synthesize(target: &SchemeParameters) -> Result<Self, Error>;

    /// Rebuild a context from previously serialized parameters
    fn from_bytes(bytes: &[u8]) -> Result<Self, Error>;

    /// Serialize the parameters this context was built from
    fn to_bytes(&self) -> Vec<u8>;

    /// Describe the parameters in terms of the target configuration
    fn parameters(&self) -> SchemeParameters;

    /// Internal consistency and security check on the built context
    fn validate(&self) -> Result<(), Error>;

    fn generate_keys(&self) -> Result<(Self::SecretKey, Self::PublicKey), Error>;

    fn public_key_to_bytes(&self, key: &Self::PublicKey) -> Vec<u8>;
    fn public_key_from_bytes(&self, bytes: &[u8]) -> Result<Self::PublicKey, Error>;
    fn secret_key_to_bytes(&self, key: &Self::SecretKey) -> Vec<u8>;
    fn secret_key_from_bytes(&self, bytes: &[u8]) -> Result<Self::SecretKey, Error>;

    /// Batch-encode a vector of counters, one per slot
    fn encode(&self, values: &[u64]) -> Result<Self::Plaintext, Error>;

    /// Decode all slots of a plaintext
    fn decode(&self, plaintext: &Self::Plaintext) -> Result<Vec<u64>, Error>;

    fn encrypt(&self, plaintext: &Self::Plaintext, key: &Self::PublicKey)
        -> Result<Self::Ciphertext, Error>;

    fn decrypt(&self, ciphertext: &Self::Ciphertext, key: &Self::SecretKey)
        -> Result<Self::Plaintext, Error>;

    /// Homomorphic addition, slot by slot. Does not mutate its operands.
    fn add(&self, a: &Self::Ciphertext, b: &Self::Ciphertext) -> Result<Self::Ciphertext, Error>;

    fn ciphertext_to_bytes(&self, ciphertext: &Self::Ciphertext) -> Vec<u8>;
    fn ciphertext_from_bytes(&self, bytes: &[u8]) -> Result<Self::Ciphertext, Error>;
}
