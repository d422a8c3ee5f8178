use crate::*;
use digest::Digest;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use sha2::Sha256;
use std::convert::TryInto;
use std::str::FromStr;

/// Target configuration of the encryption scheme.
///
/// Ciphertexts are only compatible when they were produced under the same
/// parameters, so this is pinned on first bootstrap and never changes for a
/// deployment.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SchemeParameters {
    /// Polynomial modulus degree, a power of two
    pub polynomial_degree: usize,

    /// Bit sizes of the coefficient modulus primes, in chain order
    pub coefficient_modulus_chain: Vec<usize>,

    /// Bit size of the (batching-friendly) plaintext modulus
    pub plaintext_modulus_bit_size: usize,
}

impl Default for SchemeParameters {
    fn default() -> Self {
        SchemeParameters {
            polynomial_degree: 4096,
            coefficient_modulus_chain: vec![36, 36, 37],
            plaintext_modulus_bit_size: 32,
        }
    }
}

impl SchemeParameters {
    /// Number of independent counters a single ciphertext carries
    pub fn slot_count(&self) -> usize {
        self.polynomial_degree
    }

    pub fn total_modulus_bits(&self) -> usize {
        self.coefficient_modulus_chain.iter().sum()
    }
}

impl std::fmt::Display for SchemeParameters {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "degree={} moduli={:?} plain_bits={}",
            self.polynomial_degree, self.coefficient_modulus_chain, self.plaintext_modulus_bit_size
        )
    }
}

/// Fingerprint of a deployment: SHA-256 over the serialized parameters and
/// the serialized public key.
///
/// Two deployments with identical parameters still differ in their key pair,
/// so their ciphertexts never share an id.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(pub [u8; 32]);

impl ContextId {
    pub const LEN: usize = 32;

    pub fn of(serialized_parameters: &[u8], serialized_public_key: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(&(serialized_parameters.len() as u64).to_be_bytes());
        hasher.update(serialized_parameters);
        hasher.update(serialized_public_key);
        let digest = hasher.finalize();

        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&digest);
        ContextId(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let bytes: [u8; 32] = bytes.try_into().ok()?;
        Some(ContextId(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl FromStr for ContextId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s).map_err(|e| Error::Decode(format!("bad context id: {}", e)))?;
        ContextId::from_slice(&bytes)
            .ok_or_else(|| Error::Decode("bad context id: wrong length".to_owned()))
    }
}

impl std::fmt::Display for ContextId {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", hex::encode(&self.0))
    }
}

impl<'de> Deserialize<'de> for ContextId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        FromStr::from_str(&s).map_err(de::Error::custom)
    }
}

impl Serialize for ContextId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

#[cfg(test)]
mod test {

    use super::*;

    #[test]
    fn test_context_id() {
        let a = ContextId::of(b"parameters a", b"key");
        let b = ContextId::of(b"parameters b", b"key");
        assert_ne!(a, b);
        assert_eq!(a, ContextId::of(b"parameters a", b"key"));

        // Same parameters, another key pair
        assert_ne!(a, ContextId::of(b"parameters a", b"other key"));
        // The boundary between the two inputs is part of the hash
        assert_ne!(
            ContextId::of(b"parameters", b"key"),
            ContextId::of(b"parameterskey", b"")
        );

        let stringed = a.to_string();
        assert_eq!(stringed.len(), 64);
        assert_eq!(ContextId::from_str(&stringed).unwrap(), a);

        assert!(ContextId::from_str("abcd").is_err());
        assert!(ContextId::from_str("not hex").is_err());

        let json = serde_json::to_string(&a).unwrap();
        assert_eq!(json, format!("\"{}\"", stringed));
        let back: ContextId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, a);
    }

    #[test]
    fn test_default_parameters() {
        let params = SchemeParameters::default();
        assert_eq!(params.slot_count(), 4096);
        assert_eq!(params.total_modulus_bits(), 109);
        assert_eq!(params.plaintext_modulus_bit_size, 32);
    }
}
