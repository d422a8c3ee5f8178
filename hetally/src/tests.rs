use super::*;
use crate::test_util::ScratchDir;

#[test]
fn end_to_end_election() {
    let dir = ScratchDir::new();
    let config = Config {
        key_dir: dir.path().join("keys").join("he"),
        ledger_path: dir.path().join("ledger.json"),
        ..Config::default()
    };

    // The ledger and the contract that runs on it
    let mut ledger = FileStore::open(&config.ledger_path).unwrap();
    let collector = VoteCollector::new(config.context_manager::<Bfv>());

    // Voting machines encrypt on the gateway side with the public key
    let gateway = config.context_manager::<Bfv>();
    let encrypt = |candidate: usize| {
        gateway.with_context(KeyUse::Public, |context| {
            encrypt_ballot(context, &one_hot(candidate, config.candidates)?)
        })
    };

    // Nothing is accepted before the round is set up
    let early = encrypt(2).unwrap();
    assert!(matches!(
        collector.submit_vote(&mut ledger, &early),
        Err(Error::StageViolation(Stage::Closed))
    ));

    collector.instantiate(&mut ledger).unwrap();

    let votes = [2usize, 4, 0, 0, 2, 4, 4, 4, 2, 4];
    for candidate in votes.iter() {
        let ballot = encrypt(*candidate).unwrap();
        collector.submit_vote(&mut ledger, &ballot).unwrap();
    }

    // Voting is over
    // ----------------
    collector.end_voting(&mut ledger).unwrap();
    let late = encrypt(0).unwrap();
    assert!(collector.submit_vote(&mut ledger, &late).is_err());

    // The tally survives a reload of the ledger
    let ledger = FileStore::open(&config.ledger_path).unwrap();
    let tally = collector.retrieve_tally(&ledger).unwrap().unwrap();

    // The election authority decrypts with the secret key
    let authority = config.context_manager::<Bfv>();
    let context = authority.acquire(KeyUse::ArithmeticOnly).unwrap();
    let secret = authority.load_secret_key(&context).unwrap();
    let result = decrypt_tally(&context, &secret, &tally).unwrap();

    assert_eq!(result.counts.len(), 4096);
    assert_eq!(result.count(0), 2);
    assert_eq!(result.count(1), 0);
    assert_eq!(result.count(2), 3);
    assert_eq!(result.count(3), 0);
    assert_eq!(result.count(4), 5);
    assert!(result.counts[5..].iter().all(|c| *c == 0));
    assert_eq!(result.num_votes(), 10);

    let totals: Vec<(usize, u64)> = result.totals.iter().map(|(k, v)| (*k, *v)).collect();
    assert_eq!(totals, vec![(0, 2), (2, 3), (4, 5)]);
}

#[test]
fn tally_matches_direct_decryption_after_one_ballot() {
    let dir = ScratchDir::new();
    let contexts = ContextManager::<Bfv>::new(dir.path().join("he"), SchemeParameters::default());
    let collector = VoteCollector::new(contexts);
    let mut ledger = MemStore::default();
    collector.instantiate(&mut ledger).unwrap();

    let context = collector.contexts().acquire(KeyUse::Public).unwrap();
    let secret = collector.contexts().load_secret_key(&context).unwrap();
    let ballot = encrypt_ballot(&context, &[0, 0, 7]).unwrap();

    collector.submit_vote(&mut ledger, &ballot).unwrap();
    let tally = collector.retrieve_tally(&ledger).unwrap().unwrap();

    assert_eq!(
        decrypt_tally(&context, &secret, &tally).unwrap(),
        decrypt_tally(&context, &secret, &ballot).unwrap()
    );
}
