use clap::{App, AppSettings, Arg, SubCommand};
use hetally::{Config, Error};
use std::path::PathBuf;

mod command_authority;
mod command_ledger;

fn main() {
    let matches = App::new("hetally")
        .version("0.1")
        .about("Homomorphic vote tally: key setup, ballot encryption and ledger operations")
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .arg(
            Arg::with_name("ledger")
                .long("ledger")
                .takes_value(true)
                .global(true)
                .help("Ledger state file - can also be set with HETALLY_LEDGER_PATH"),
        )
        .arg(
            Arg::with_name("keys")
                .long("keys")
                .takes_value(true)
                .global(true)
                .help("Key directory - can also be set with HETALLY_KEY_DIR"),
        )
        .arg(
            Arg::with_name("v")
                .short("v")
                .multiple(true)
                .global(true)
                .help("Sets the level of verbosity"),
        )
        .subcommand(
            SubCommand::with_name("keygen")
                .about("Create encryption parameters and keys, or check the existing ones"),
        )
        .subcommand(
            SubCommand::with_name("encrypt")
                .about("Encrypt a one-hot ballot for a candidate")
                .arg(
                    Arg::with_name("CANDIDATE")
                        .index(1)
                        .required(true)
                        .help("Zero-based candidate index"),
                ),
        )
        .subcommand(SubCommand::with_name("instantiate").about("Open the voting round"))
        .subcommand(
            SubCommand::with_name("submit")
                .about("Add an encrypted ballot to the tally")
                .arg(
                    Arg::with_name("BALLOT")
                        .index(1)
                        .required(true)
                        .help("Base64 ballot, or - to read it from stdin"),
                ),
        )
        .subcommand(SubCommand::with_name("end").about("Close the voting round"))
        .subcommand(
            SubCommand::with_name("apply")
                .about("Apply a packed transaction")
                .arg(
                    Arg::with_name("INPUT")
                        .index(1)
                        .required(true)
                        .help("Transaction file in JSON or CBOR format, or - for stdin"),
                ),
        )
        .subcommand(SubCommand::with_name("tally").about("Print the encrypted tally"))
        .subcommand(
            SubCommand::with_name("decrypt")
                .about("Decrypt the tally with the secret key")
                .arg(
                    Arg::with_name("TALLY")
                        .index(1)
                        .required(false)
                        .help("Base64 tally to decrypt instead of the ledger's"),
                ),
        )
        .subcommand(SubCommand::with_name("stage").about("Print the voting stage"))
        .get_matches();

    let verbosity = matches.occurrences_of("v")
        + matches
            .subcommand()
            .1
            .map(|sub| sub.occurrences_of("v"))
            .unwrap_or(0);
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    // RUST_LOG wins over -v. Logs go to stderr, stdout carries ballots and tallies.
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = match load_config(&matches) {
        Ok(config) => config,
        Err(e) => fail(e),
    };
    log::info!(
        "keys in {}, ledger at {}, parameters {}",
        config.key_dir.display(),
        config.ledger_path.display(),
        config.scheme
    );

    let result = match matches.subcommand() {
        ("keygen", Some(_)) => command_authority::command_keygen(&config),
        ("encrypt", Some(sub)) => command_authority::command_encrypt(sub, &config),
        ("decrypt", Some(sub)) => command_authority::command_decrypt(sub, &config),
        ("instantiate", Some(_)) => command_ledger::command_instantiate(&config),
        ("submit", Some(sub)) => command_ledger::command_submit(sub, &config),
        ("end", Some(_)) => command_ledger::command_end(&config),
        ("apply", Some(sub)) => command_ledger::command_apply(sub, &config),
        ("tally", Some(_)) => command_ledger::command_tally(&config),
        ("stage", Some(_)) => command_ledger::command_stage(&config),
        _ => unreachable!("subcommand required"),
    };

    if let Err(e) = result {
        fail(e);
    }
}

/// Environment settings with command-line overrides
fn load_config(matches: &clap::ArgMatches) -> Result<Config, Error> {
    // Global flags may follow the subcommand
    let flag = |name: &str| {
        matches
            .subcommand()
            .1
            .and_then(|sub| sub.value_of(name))
            .or_else(|| matches.value_of(name))
            .map(PathBuf::from)
    };

    let mut config = Config::from_env()?;
    if let Some(keys) = flag("keys") {
        config.key_dir = keys;
    }
    if let Some(ledger) = flag("ledger") {
        config.ledger_path = ledger;
    }
    config.key_dir = expand(&config.key_dir)?;
    config.ledger_path = expand(&config.ledger_path)?;
    Ok(config)
}

pub fn expand(path: &std::path::Path) -> Result<PathBuf, Error> {
    let raw = path.to_string_lossy();
    let expanded = shellexpand::full(&raw)
        .map_err(|e| Error::Config("path", format!("cannot expand {}: {}", raw, e)))?;
    Ok(PathBuf::from(expanded.as_ref()))
}

/// Read a command argument, treating `-` as stdin
pub fn read_input(arg: &str) -> Result<Vec<u8>, Error> {
    use std::io::Read;

    if arg == "-" {
        let mut buf = Vec::new();
        std::io::stdin().read_to_end(&mut buf)?;
        Ok(buf)
    } else {
        Ok(std::fs::read(arg)?)
    }
}

fn fail(e: Error) -> ! {
    eprintln!("{}", e);
    if e.is_deployment_fatal() {
        eprintln!("hetally: the key directory or parameters need an administrator");
    }
    std::process::exit(1);
}
