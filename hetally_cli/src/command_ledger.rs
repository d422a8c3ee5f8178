use super::read_input;
use hetally::*;

fn open(config: &Config) -> Result<(VoteCollector<Bfv>, FileStore), Error> {
    let collector = VoteCollector::new(config.context_manager::<Bfv>());
    let store = FileStore::open(&config.ledger_path)?;
    Ok((collector, store))
}

pub fn command_instantiate(config: &Config) -> Result<(), Error> {
    let (collector, mut store) = open(config)?;
    collector.instantiate(&mut store)?;
    println!("{}", collector.stage(&store)?);
    Ok(())
}

pub fn command_end(config: &Config) -> Result<(), Error> {
    let (collector, mut store) = open(config)?;
    collector.end_voting(&mut store)?;
    println!("{}", collector.stage(&store)?);
    Ok(())
}

pub fn command_submit(matches: &clap::ArgMatches, config: &Config) -> Result<(), Error> {
    let ballot = match matches.value_of("BALLOT") {
        Some("-") => String::from_utf8(read_input("-")?)
            .map_err(|_| Error::Decode("ballot is not UTF-8".to_owned()))?,
        Some(ballot) => ballot.to_owned(),
        None => {
            eprintln!("hetally submit: ballot required");
            std::process::exit(1);
        }
    };

    let (collector, mut store) = open(config)?;
    collector.submit_vote(&mut store, &ballot)?;
    log::info!("ballot accepted");
    Ok(())
}

/// Apply a JSON or CBOR transaction file
pub fn command_apply(matches: &clap::ArgMatches, config: &Config) -> Result<(), Error> {
    let input = matches.value_of("INPUT").unwrap_or("-");
    let payload = read_input(input)?;

    let (collector, mut store) = open(config)?;
    let transaction = Transaction::from_bytes(&payload)?;
    collector.apply(&payload, &mut store)?;
    log::info!("applied {}", transaction.name());
    Ok(())
}

pub fn command_tally(config: &Config) -> Result<(), Error> {
    let (collector, store) = open(config)?;
    match collector.retrieve_tally(&store)? {
        Some(tally) => println!("{}", tally),
        None => eprintln!("hetally tally: no ballots have been tallied"),
    }
    Ok(())
}

pub fn command_stage(config: &Config) -> Result<(), Error> {
    let (collector, store) = open(config)?;
    println!("{}", collector.stage(&store)?);
    Ok(())
}
