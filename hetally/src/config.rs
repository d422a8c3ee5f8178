use crate::*;
use std::env::var;
use std::path::PathBuf;

pub const DEFAULT_KEY_DIR: &str = "./keys/he";
pub const DEFAULT_LEDGER_PATH: &str = "./ledger.json";
pub const DEFAULT_CANDIDATES: usize = 8;

/// Deployment settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub key_dir: PathBuf,
    pub ledger_path: PathBuf,
    pub scheme: SchemeParameters,
    pub candidates: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            key_dir: PathBuf::from(DEFAULT_KEY_DIR),
            ledger_path: PathBuf::from(DEFAULT_LEDGER_PATH),
            scheme: SchemeParameters::default(),
            candidates: DEFAULT_CANDIDATES,
        }
    }
}

impl Config {
    /// Read settings from `HETALLY_*` environment variables, falling back to
    /// defaults for anything unset
    pub fn from_env() -> Result<Self, Error> {
        Config::from_lookup(|name| var(name).ok())
    }

    /// Read settings through an arbitrary lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();

        let key_dir = match lookup("HETALLY_KEY_DIR") {
            Some(val) => PathBuf::from(val),
            None => defaults.key_dir,
        };

        let ledger_path = match lookup("HETALLY_LEDGER_PATH") {
            Some(val) => PathBuf::from(val),
            None => defaults.ledger_path,
        };

        let polynomial_degree = match lookup("HETALLY_POLY_DEGREE") {
            Some(val) => parse_number("HETALLY_POLY_DEGREE", &val)?,
            None => defaults.scheme.polynomial_degree,
        };

        let coefficient_modulus_chain = match lookup("HETALLY_COEFF_MODULI") {
            Some(val) => val
                .split(',')
                .map(|bits| parse_number("HETALLY_COEFF_MODULI", bits))
                .collect::<Result<Vec<usize>, Error>>()?,
            None => defaults.scheme.coefficient_modulus_chain,
        };

        let plaintext_modulus_bit_size = match lookup("HETALLY_PLAIN_BITS") {
            Some(val) => parse_number("HETALLY_PLAIN_BITS", &val)?,
            None => defaults.scheme.plaintext_modulus_bit_size,
        };

        let candidates = match lookup("HETALLY_CANDIDATES") {
            Some(val) => parse_number("HETALLY_CANDIDATES", &val)?,
            None => defaults.candidates,
        };
        if candidates == 0 {
            return Err(Error::Config("HETALLY_CANDIDATES", "must be at least 1".to_owned()));
        }

        Ok(Config {
            key_dir,
            ledger_path,
            scheme: SchemeParameters {
                polynomial_degree,
                coefficient_modulus_chain,
                plaintext_modulus_bit_size,
            },
            candidates,
        })
    }

    /// Context manager for the configured key directory and parameters
    pub fn context_manager<S: Scheme>(&self) -> ContextManager<S> {
        ContextManager::new(self.key_dir.clone(), self.scheme.clone())
    }
}

fn parse_number(name: &'static str, val: &str) -> Result<usize, Error> {
    val.trim()
        .parse()
        .map_err(|_| Error::Config(name, format!("{:?} is not a number", val)))
}

#[cfg(test)]
mod test {

    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.scheme.coefficient_modulus_chain, vec![36, 36, 37]);
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("HETALLY_KEY_DIR", "/srv/keys"),
            ("HETALLY_POLY_DEGREE", "8192"),
            ("HETALLY_COEFF_MODULI", "43, 43,44,44,44"),
            ("HETALLY_CANDIDATES", "5"),
        ]))
        .unwrap();
        assert_eq!(config.key_dir, PathBuf::from("/srv/keys"));
        assert_eq!(config.scheme.polynomial_degree, 8192);
        assert_eq!(config.scheme.coefficient_modulus_chain, vec![43, 43, 44, 44, 44]);
        assert_eq!(config.scheme.plaintext_modulus_bit_size, 32);
        assert_eq!(config.candidates, 5);
    }

    #[test]
    fn test_bad_values() {
        assert!(matches!(
            Config::from_lookup(lookup(&[("HETALLY_POLY_DEGREE", "lots")])),
            Err(Error::Config("HETALLY_POLY_DEGREE", _))
        ));
        assert!(matches!(
            Config::from_lookup(lookup(&[("HETALLY_COEFF_MODULI", "36,,37")])),
            Err(Error::Config("HETALLY_COEFF_MODULI", _))
        ));
        assert!(matches!(
            Config::from_lookup(lookup(&[("HETALLY_CANDIDATES", "0")])),
            Err(Error::Config("HETALLY_CANDIDATES", _))
        ));
    }
}
