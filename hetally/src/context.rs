use crate::*;
use log::{debug, info, warn};
use rand::rngs::OsRng;
use rand::RngCore;
use std::fs;
use std::io::Write;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

pub const PARAMETERS_FILE: &str = "encryption.parameters";
pub const PUBLIC_KEY_FILE: &str = "pub.key";
pub const SECRET_KEY_FILE: &str = "sec.key";

/// Staging directories older than this belong to an interrupted bootstrap
const STALE_STAGING_AGE: Duration = Duration::from_secs(600);

/// Which key material a context is acquired with
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum KeyUse {
    /// Ciphertext addition only: the public key is fingerprinted, never parsed
    ArithmeticOnly,

    /// Encryption side: the public key is loaded as well
    Public,
}

/// A ready-to-use cryptographic context for a single operation.
///
/// Everything the backend allocated is released when this is dropped, on
/// every exit path of the operation that acquired it.
pub struct TallyContext<S: Scheme> {
    scheme: S,
    context_id: ContextId,
    public_key: Option<S::PublicKey>,
}

impl<S: Scheme> TallyContext<S> {
    fn new(scheme: S, context_id: ContextId, public_key: Option<S::PublicKey>) -> Self {
        debug!("acquired tally context {}", context_id);
        TallyContext {
            scheme,
            context_id,
            public_key,
        }
    }

    pub fn scheme(&self) -> &S {
        &self.scheme
    }

    pub fn context_id(&self) -> ContextId {
        self.context_id
    }

    pub fn parameters(&self) -> SchemeParameters {
        self.scheme.parameters()
    }

    pub fn public_key(&self) -> Result<&S::PublicKey, Error> {
        self.public_key.as_ref().ok_or_else(|| {
            Error::KeyMaterial("context was acquired without the public key".to_owned())
        })
    }

    /// Parse a base64 ciphertext frame under this context.
    ///
    /// The context fingerprint is compared before the backend sees the body,
    /// so a ciphertext from another parameter set or another key pair is
    /// rejected and never reaches the arithmetic.
    pub fn open(&self, encoded: &str) -> Result<S::Ciphertext, Error> {
        let frame = CiphertextFrame::from_base64(encoded)?;
        if frame.context_id != self.context_id {
            return Err(Error::OperandMismatch {
                expected: self.context_id,
                found: frame.context_id,
            });
        }
        self.scheme.ciphertext_from_bytes(&frame.body)
    }

    /// Serialize a ciphertext into a base64 frame
    pub fn seal(&self, ciphertext: &S::Ciphertext) -> String {
        CiphertextFrame {
            context_id: self.context_id,
            body: self.scheme.ciphertext_to_bytes(ciphertext),
        }
        .to_base64()
    }

    /// Encode and encrypt a vector of counters under the public key
    pub fn encrypt_values(&self, values: &[u64]) -> Result<String, Error> {
        let plaintext = self.scheme.encode(values)?;
        let ciphertext = self.scheme.encrypt(&plaintext, self.public_key()?)?;
        Ok(self.seal(&ciphertext))
    }

    /// Decrypt a ciphertext frame and decode every slot
    pub fn decrypt_values(&self, encoded: &str, secret: &S::SecretKey) -> Result<Vec<u64>, Error> {
        let ciphertext = self.open(encoded)?;
        let plaintext = self.scheme.decrypt(&ciphertext, secret)?;
        self.scheme.decode(&plaintext)
    }
}

impl<S: Scheme> Drop for TallyContext<S> {
    fn drop(&mut self) {
        debug!("released tally context {}", self.context_id);
    }
}

/// Owns the lifecycle of scheme parameters and the key pair.
///
/// Parameters and keys are generated together, exactly once, the first time a
/// context is acquired against an empty key directory. Every later
/// acquisition reloads them and refuses to continue if they no longer match
/// the requested configuration.
pub struct ContextManager<S: Scheme> {
    key_dir: PathBuf,
    target: SchemeParameters,
    _scheme: PhantomData<fn() -> S>,
}

struct Artifacts {
    parameters: PathBuf,
    public_key: PathBuf,
    secret_key: PathBuf,
}

impl Artifacts {
    fn in_dir(dir: &Path) -> Self {
        Artifacts {
            parameters: dir.join(PARAMETERS_FILE),
            public_key: dir.join(PUBLIC_KEY_FILE),
            secret_key: dir.join(SECRET_KEY_FILE),
        }
    }
}

impl<S: Scheme> ContextManager<S> {
    pub fn new<P: Into<PathBuf>>(key_dir: P, target: SchemeParameters) -> Self {
        ContextManager {
            key_dir: key_dir.into(),
            target,
            _scheme: PhantomData,
        }
    }

    pub fn key_dir(&self) -> &Path {
        &self.key_dir
    }

    pub fn target(&self) -> &SchemeParameters {
        &self.target
    }

    /// Load the context, bootstrapping parameters and keys if none exist yet
    pub fn acquire(&self, keys: KeyUse) -> Result<TallyContext<S>, Error> {
        self.sweep_staging(STALE_STAGING_AGE);
        match self.inventory()? {
            Some(artifacts) => self.load(&artifacts, keys),
            None => self.bootstrap(keys),
        }
    }

    /// Load the context from existing key material, never bootstrapping.
    ///
    /// An empty key directory is a `KeyMaterial` error here.
    pub fn load_existing(&self, keys: KeyUse) -> Result<TallyContext<S>, Error> {
        match self.inventory()? {
            Some(artifacts) => self.load(&artifacts, keys),
            None => Err(Error::KeyMaterial(format!(
                "no key material in {}",
                self.key_dir.display()
            ))),
        }
    }

    /// Context and secret key for the decryption authority.
    ///
    /// Only existing key material is used: a fresh key pair would decrypt the
    /// tally to noise.
    pub fn load_authority(&self) -> Result<(TallyContext<S>, S::SecretKey), Error> {
        let context = self.load_existing(KeyUse::Public)?;
        let secret = self.load_secret_key(&context)?;
        Ok((context, secret))
    }

    /// `Some` when all three artifacts exist, `None` when none do
    fn inventory(&self) -> Result<Option<Artifacts>, Error> {
        let artifacts = Artifacts::in_dir(&self.key_dir);
        let has_parameters = artifacts.parameters.is_file();
        let has_public = artifacts.public_key.is_file();
        let has_secret = artifacts.secret_key.is_file();

        match (has_parameters, has_public, has_secret) {
            (false, false, false) => Ok(None),
            (true, true, true) => Ok(Some(artifacts)),
            (true, _, _) => {
                let missing = if has_public { SECRET_KEY_FILE } else { PUBLIC_KEY_FILE };
                Err(Error::KeyMaterial(format!(
                    "{} exists but {} is missing in {}",
                    PARAMETERS_FILE,
                    missing,
                    self.key_dir.display()
                )))
            }
            (false, _, _) => Err(Error::KeyMaterial(format!(
                "key files exist without {} in {}",
                PARAMETERS_FILE,
                self.key_dir.display()
            ))),
        }
    }

    /// Run `op` with a freshly acquired context, releasing it afterwards
    pub fn with_context<T, F>(&self, keys: KeyUse, op: F) -> Result<T, Error>
    where
        F: FnOnce(&TallyContext<S>) -> Result<T, Error>,
    {
        let context = self.acquire(keys)?;
        op(&context)
    }

    /// Load the secret key for the decryption tool.
    ///
    /// The tally path never calls this. The key is checked against the public
    /// key so that a mismatched companion file is reported instead of
    /// producing garbage plaintexts.
    pub fn load_secret_key(&self, context: &TallyContext<S>) -> Result<S::SecretKey, Error> {
        let artifacts = Artifacts::in_dir(&self.key_dir);
        let bytes = read_artifact(&artifacts.secret_key)?;
        let secret = context.scheme.secret_key_from_bytes(&bytes)?;

        let loaded_public;
        let public = match context.public_key.as_ref() {
            Some(public) => public,
            None => {
                loaded_public = self.load_public_key(&context.scheme, &artifacts)?;
                &loaded_public
            }
        };

        let check = context.scheme.encode(&[1])?;
        let check = context.scheme.encrypt(&check, public)?;
        let check = context.scheme.decrypt(&check, &secret)?;
        let check = context.scheme.decode(&check)?;
        if check.first() != Some(&1) {
            return Err(Error::KeyMaterial(format!(
                "{} does not belong to {}",
                SECRET_KEY_FILE, PUBLIC_KEY_FILE
            )));
        }

        Ok(secret)
    }

    fn load(&self, artifacts: &Artifacts, keys: KeyUse) -> Result<TallyContext<S>, Error> {
        let encoded = fs::read_to_string(&artifacts.parameters).map_err(|e| {
            Error::Configuration(format!("cannot read {}: {}", PARAMETERS_FILE, e))
        })?;
        let bytes = base64::decode(encoded.trim()).map_err(|e| {
            Error::Configuration(format!("cannot parse {}: {}", PARAMETERS_FILE, e))
        })?;
        let scheme = S::from_bytes(&bytes)?;

        if scheme.to_bytes() != bytes {
            return Err(Error::Configuration(format!(
                "{} does not reproduce byte-identical parameters",
                PARAMETERS_FILE
            )));
        }
        scheme.validate()?;

        let loaded = scheme.parameters();
        if loaded != self.target {
            return Err(Error::Configuration(format!(
                "persisted parameters ({}) differ from requested parameters ({})",
                loaded, self.target
            )));
        }

        let public_bytes = read_artifact(&artifacts.public_key)?;
        let public_key = match keys {
            KeyUse::ArithmeticOnly => None,
            KeyUse::Public => Some(scheme.public_key_from_bytes(&public_bytes)?),
        };

        let context_id = ContextId::of(&bytes, &public_bytes);
        Ok(TallyContext::new(scheme, context_id, public_key))
    }

    fn load_public_key(&self, scheme: &S, artifacts: &Artifacts) -> Result<S::PublicKey, Error> {
        let bytes = read_artifact(&artifacts.public_key)?;
        scheme.public_key_from_bytes(&bytes)
    }

    /// Generate parameters and keys, then publish all three artifacts at once.
    ///
    /// The artifacts are written into a private staging directory which is
    /// renamed onto the key directory. Renaming onto a populated directory
    /// fails, so when two bootstraps race exactly one key pair is published and
    /// the loser reloads it.
    fn bootstrap(&self, keys: KeyUse) -> Result<TallyContext<S>, Error> {
        let scheme = S::synthesize(&self.target)?;
        scheme.validate()?;

        let (secret, public) = scheme.generate_keys()?;
        let parameters = scheme.to_bytes();
        let public_bytes = scheme.public_key_to_bytes(&public);

        let staging = self.staging_dir()?;
        let written = write_artifacts(
            &staging,
            &parameters,
            &public_bytes,
            &scheme.secret_key_to_bytes(&secret),
        );
        if let Err(e) = written {
            let _ = fs::remove_dir_all(&staging);
            return Err(e);
        }

        if let Err(e) = fs::rename(&staging, &self.key_dir) {
            let _ = fs::remove_dir_all(&staging);
            let artifacts = Artifacts::in_dir(&self.key_dir);
            if artifacts.parameters.is_file() {
                warn!(
                    "key material in {} was bootstrapped concurrently, using it",
                    self.key_dir.display()
                );
                return self.load(&artifacts, keys);
            }
            return Err(Error::KeyMaterial(format!(
                "cannot publish key material to {}: {}",
                self.key_dir.display(),
                e
            )));
        }

        let context = TallyContext::new(
            scheme,
            ContextId::of(&parameters, &public_bytes),
            match keys {
                KeyUse::ArithmeticOnly => None,
                KeyUse::Public => Some(public),
            },
        );
        info!(
            "bootstrapped parameters {} ({}) in {}",
            context.context_id,
            self.target,
            self.key_dir.display()
        );
        Ok(context)
    }

    /// Parent directory of the staging directories and their name prefix
    fn staging_location(&self) -> (PathBuf, String) {
        let parent = match self.key_dir.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let name = self
            .key_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "keys".to_owned());
        (parent, format!(".{}.bootstrap-", name))
    }

    fn staging_dir(&self) -> Result<PathBuf, Error> {
        let (parent, prefix) = self.staging_location();
        fs::create_dir_all(&parent)?;

        let mut nonce = [0u8; 8];
        OsRng.fill_bytes(&mut nonce);
        let staging = parent.join(format!("{}{}", prefix, hex::encode(nonce)));
        fs::create_dir(&staging)?;
        Ok(staging)
    }

    /// Remove staging directories left behind by an interrupted bootstrap.
    ///
    /// They may hold a secret key seed. Younger ones may belong to a bootstrap
    /// still in progress and are left alone.
    fn sweep_staging(&self, max_age: Duration) {
        let (parent, prefix) = self.staging_location();
        let entries = match fs::read_dir(&parent) {
            Ok(entries) => entries,
            Err(_) => return,
        };

        for entry in entries.flatten() {
            if !entry.file_name().to_string_lossy().starts_with(&prefix) {
                continue;
            }
            let age = entry
                .metadata()
                .and_then(|meta| meta.modified())
                .ok()
                .and_then(|modified| SystemTime::now().duration_since(modified).ok());
            if let Some(age) = age {
                if age >= max_age {
                    warn!(
                        "removing stale bootstrap staging directory {}",
                        entry.path().display()
                    );
                    if let Err(e) = fs::remove_dir_all(entry.path()) {
                        warn!("cannot remove {}: {}", entry.path().display(), e);
                    }
                }
            }
        }
    }
}

fn write_artifacts(
    dir: &Path,
    parameters: &[u8],
    public_key: &[u8],
    secret_key: &[u8],
) -> Result<(), Error> {
    let artifacts = Artifacts::in_dir(dir);
    write_artifact(&artifacts.public_key, public_key)?;
    write_artifact(&artifacts.secret_key, secret_key)?;
    write_artifact(&artifacts.parameters, parameters)?;
    Ok(())
}

fn write_artifact(path: &Path, bytes: &[u8]) -> Result<(), Error> {
    let mut file = fs::File::create(path)?;
    file.write_all(base64::encode(bytes).as_bytes())?;
    file.sync_all()?;
    Ok(())
}

fn read_artifact(path: &Path) -> Result<Vec<u8>, Error> {
    let encoded = fs::read_to_string(path).map_err(|e| {
        Error::KeyMaterial(format!("cannot read {}: {}", path.display(), e))
    })?;
    base64::decode(encoded.trim())
        .map_err(|e| Error::KeyMaterial(format!("cannot parse {}: {}", path.display(), e)))
}
