use crate::*;
use indexmap::IndexMap;

/// A choice vector with a single 1 at the voted candidate's slot
pub fn one_hot(candidate: usize, candidates: usize) -> Result<Vec<u64>, Error> {
    if candidate >= candidates {
        return Err(Error::InvalidBallot(format!(
            "candidate {} out of range for {} candidates",
            candidate, candidates
        )));
    }
    let mut choices = vec![0u64; candidates];
    choices[candidate] = 1;
    Ok(choices)
}

/// Encrypt a choice vector into a base64 ballot.
///
/// The context must have been acquired with the public key.
pub fn encrypt_ballot<S: Scheme>(context: &TallyContext<S>, choices: &[u64]) -> Result<String, Error> {
    let slots = context.parameters().slot_count();
    if choices.len() > slots {
        return Err(Error::InvalidBallot(format!(
            "{} candidates do not fit in {} slots",
            choices.len(),
            slots
        )));
    }
    context.encrypt_values(choices)
}

/// Decrypted per-candidate totals
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TallyResult {
    /// One counter per slot, in candidate order
    pub counts: Vec<u64>,

    /// Candidates with at least one vote
    pub totals: IndexMap<usize, u64>,
}

impl TallyResult {
    pub fn from_counts(counts: Vec<u64>) -> Self {
        let totals = counts
            .iter()
            .enumerate()
            .filter(|(_, count)| **count > 0)
            .map(|(candidate, count)| (candidate, *count))
            .collect();
        TallyResult { counts, totals }
    }

    pub fn num_votes(&self) -> u64 {
        self.counts.iter().sum()
    }

    pub fn count(&self, candidate: usize) -> u64 {
        self.counts.get(candidate).copied().unwrap_or(0)
    }
}

/// Decrypt a tally with the election authority's secret key
pub fn decrypt_tally<S: Scheme>(
    context: &TallyContext<S>,
    secret: &S::SecretKey,
    tally: &str,
) -> Result<TallyResult, Error> {
    let counts = context.decrypt_values(tally, secret)?;
    Ok(TallyResult::from_counts(counts))
}
