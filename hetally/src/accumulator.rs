use crate::*;
use log::debug;

/// Homomorphic sum of two ciphertexts under the same context.
///
/// The result decrypts to the slot-wise sum of both plaintexts. Neither
/// operand is modified.
pub fn add<S: Scheme>(
    context: &TallyContext<S>,
    previous: &S::Ciphertext,
    ballot: &S::Ciphertext,
) -> Result<S::Ciphertext, Error> {
    context.scheme().add(previous, ballot)
}

/// Fold a serialized ballot into a serialized tally.
///
/// Without a previous tally the ballot itself becomes the tally, after
/// checking that it parses under the context. Both operands must carry the
/// context fingerprint. Nothing is returned on failure, so the
/// caller's stored tally stays authoritative.
pub fn fold_ballot<S: Scheme>(
    context: &TallyContext<S>,
    previous: Option<&str>,
    ballot: &str,
) -> Result<String, Error> {
    let ballot_ct = context.open(ballot)?;

    let previous = match previous {
        Some(previous) => previous,
        None => {
            debug!("first ballot becomes the tally");
            return Ok(ballot.trim().to_owned());
        }
    };

    let previous_ct = context.open(previous)?;
    let sum = add(context, &previous_ct, &ballot_ct)?;
    debug!("ballot folded into tally {}", context.context_id());
    Ok(context.seal(&sum))
}
