use hetally::*;
use log::info;

/// Create parameters and keys, or confirm the existing ones load cleanly
pub fn command_keygen(config: &Config) -> Result<(), Error> {
    let contexts = config.context_manager::<Bfv>();
    let context = contexts.acquire(KeyUse::Public)?;
    contexts.load_secret_key(&context)?;

    println!("key directory: {}", contexts.key_dir().display());
    println!("parameters:    {}", context.parameters());
    println!("context id:    {}", context.context_id());
    Ok(())
}

/// Print a base64 ballot voting for one candidate
pub fn command_encrypt(matches: &clap::ArgMatches, config: &Config) -> Result<(), Error> {
    let candidate = matches.value_of("CANDIDATE").unwrap_or_default();
    let candidate: usize = candidate
        .trim()
        .parse()
        .map_err(|_| Error::InvalidBallot(format!("{:?} is not a candidate index", candidate)))?;

    let choices = one_hot(candidate, config.candidates)?;
    let ballot = config
        .context_manager::<Bfv>()
        .with_context(KeyUse::Public, |context| encrypt_ballot(context, &choices))?;

    info!("encrypted ballot for candidate {}", candidate);
    println!("{}", ballot);
    Ok(())
}

/// Decrypt the tally and print per-candidate counts as JSON
pub fn command_decrypt(matches: &clap::ArgMatches, config: &Config) -> Result<(), Error> {
    let tally = match matches.value_of("TALLY") {
        Some(tally) => tally.to_owned(),
        None => {
            let store = FileStore::open(&config.ledger_path)?;
            match store.get_tally()? {
                Some(tally) => tally,
                None => {
                    eprintln!("hetally decrypt: no ballots have been tallied");
                    std::process::exit(1);
                }
            }
        }
    };

    // Never bootstraps: a wrong key directory must fail, not mint new keys
    let (context, secret) = config.context_manager::<Bfv>().load_authority()?;
    let result = decrypt_tally(&context, &secret, &tally)?;

    // Only the configured candidates are meaningful
    let mut counts = result.counts;
    counts.truncate(config.candidates);
    let result = TallyResult::from_counts(counts);

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
