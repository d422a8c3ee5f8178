use crate::*;
use log::info;

/// A ledger transaction addressed to the vote collector
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(tag = "type")]
#[serde(rename_all = "snake_case")]
pub enum Transaction {
    Instantiate,
    SubmitVote { vote: String },
    EndVoting,
}

impl Transaction {
    /// Unpack a JSON or CBOR payload
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        // If it starts with `{` then it's JSON
        match bytes.iter().find(|b| !b.is_ascii_whitespace()) {
            Some(b'{') => Ok(serde_json::from_slice(bytes)?),
            Some(_) => Ok(serde_cbor::from_slice(bytes)?),
            None => Err(Error::UnknownPayloadFormat),
        }
    }

    /// Pack as CBOR
    pub fn as_bytes(&self) -> Result<Vec<u8>, Error> {
        Ok(serde_cbor::to_vec(self)?)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Transaction::Instantiate => "instantiate",
            Transaction::SubmitVote { .. } => "submit_vote",
            Transaction::EndVoting => "end_voting",
        }
    }
}

/// The ledger-hosted contract that accumulates encrypted ballots.
///
/// Every method is one ledger transaction against `store`. The store is
/// expected to serialize transactions; nothing here locks.
pub struct VoteCollector<S: Scheme> {
    contexts: ContextManager<S>,
}

impl<S: Scheme> VoteCollector<S> {
    pub fn new(contexts: ContextManager<S>) -> Self {
        VoteCollector { contexts }
    }

    pub fn contexts(&self) -> &ContextManager<S> {
        &self.contexts
    }

    /// Open the voting round
    pub fn instantiate<L: LedgerStateStore>(&self, store: &mut L) -> Result<(), Error> {
        let stage = store.get_stage()?.instantiate()?;
        store.put_stage(stage)?;
        info!("voting round is {}", stage);
        Ok(())
    }

    /// Close the voting round, freezing the tally
    pub fn end_voting<L: LedgerStateStore>(&self, store: &mut L) -> Result<(), Error> {
        let stage = store.get_stage()?.end()?;
        store.put_stage(stage)?;
        info!("voting round is {}", stage);
        Ok(())
    }

    /// Add an encrypted ballot to the tally
    pub fn submit_vote<L: LedgerStateStore>(&self, store: &mut L, vote: &str) -> Result<(), Error> {
        // Reject before paying for context construction
        store.get_stage()?.assert_ongoing()?;

        let previous = store.get_tally()?;
        let tally = self
            .contexts
            .with_context(KeyUse::ArithmeticOnly, |context| {
                accumulator::fold_ballot(context, previous.as_deref(), vote)
            })?;

        store.put_tally(&tally)
    }

    /// The current tally ciphertext, at any stage
    pub fn retrieve_tally<L: LedgerStateStore>(&self, store: &L) -> Result<Option<String>, Error> {
        store.get_tally()
    }

    pub fn stage<L: LedgerStateStore>(&self, store: &L) -> Result<Stage, Error> {
        store.get_stage()
    }

    /// Dispatch a packed transaction
    pub fn apply<L: LedgerStateStore>(&self, payload: &[u8], store: &mut L) -> Result<(), Error> {
        let transaction = Transaction::from_bytes(payload)?;
        match transaction {
            Transaction::Instantiate => self.instantiate(store),
            Transaction::SubmitVote { vote } => self.submit_vote(store, &vote),
            Transaction::EndVoting => self.end_voting(store),
        }
    }
}

#[cfg(test)]
mod test {

    use super::*;
    use crate::test_util::ScratchDir;

    fn collector(dir: &ScratchDir) -> VoteCollector<Bfv> {
        VoteCollector::new(ContextManager::new(
            dir.path().join("he"),
            SchemeParameters::default(),
        ))
    }

    fn ballot(collector: &VoteCollector<Bfv>, candidate: usize) -> String {
        let context = collector.contexts().acquire(KeyUse::Public).unwrap();
        encrypt_ballot(&context, &one_hot(candidate, 5).unwrap()).unwrap()
    }

    #[test]
    fn test_instantiate() {
        let dir = ScratchDir::new();
        let collector = collector(&dir);
        let mut store = MemStore::default();

        assert_eq!(collector.stage(&store).unwrap(), Stage::Closed);
        collector.instantiate(&mut store).unwrap();
        assert_eq!(collector.stage(&store).unwrap(), Stage::Ongoing);
    }

    #[test]
    fn test_refuse_vote_outside_voting_time() {
        let dir = ScratchDir::new();
        let collector = collector(&dir);
        let mut store = MemStore::default();

        // The stage check runs before any context exists
        let err = collector.submit_vote(&mut store, "anything").err().unwrap();
        assert!(matches!(err, Error::StageViolation(Stage::Closed)));
        assert!(!collector.contexts().key_dir().exists());
        assert_eq!(collector.retrieve_tally(&store).unwrap(), None);

        let vote = ballot(&collector, 1);
        collector.instantiate(&mut store).unwrap();
        collector.submit_vote(&mut store, &vote).unwrap();
        let tally = collector.retrieve_tally(&store).unwrap();

        collector.end_voting(&mut store).unwrap();
        assert!(matches!(
            collector.submit_vote(&mut store, &vote),
            Err(Error::StageViolation(Stage::Ended))
        ));
        assert_eq!(collector.retrieve_tally(&store).unwrap(), tally);
    }

    #[test]
    fn test_failed_submission_keeps_tally() {
        let dir = ScratchDir::new();
        let collector = collector(&dir);
        let mut store = MemStore::default();
        collector.instantiate(&mut store).unwrap();

        assert!(matches!(
            collector.submit_vote(&mut store, "not a ballot"),
            Err(Error::Decode(_))
        ));
        assert_eq!(collector.retrieve_tally(&store).unwrap(), None);

        let vote = ballot(&collector, 0);
        collector.submit_vote(&mut store, &vote).unwrap();
        let tally = collector.retrieve_tally(&store).unwrap();
        assert_eq!(tally.as_deref(), Some(vote.as_str()));

        assert!(collector.submit_vote(&mut store, "bm9wZQ==").is_err());
        assert_eq!(collector.retrieve_tally(&store).unwrap(), tally);
    }

    #[test]
    fn test_end_voting_requires_ongoing() {
        let dir = ScratchDir::new();
        let collector = collector(&dir);
        let mut store = MemStore::default();

        assert!(matches!(
            collector.end_voting(&mut store),
            Err(Error::StageViolation(Stage::Closed))
        ));
        collector.instantiate(&mut store).unwrap();
        collector.end_voting(&mut store).unwrap();
        assert!(matches!(
            collector.instantiate(&mut store),
            Err(Error::InvalidTransition { .. })
        ));
        assert_eq!(collector.stage(&store).unwrap(), Stage::Ended);
    }

    #[test]
    fn test_apply_payloads() {
        let dir = ScratchDir::new();
        let collector = collector(&dir);
        let mut store = MemStore::default();

        collector
            .apply(br#"{"type": "instantiate"}"#, &mut store)
            .unwrap();
        assert_eq!(store.get_stage().unwrap(), Stage::Ongoing);

        let submit = Transaction::SubmitVote {
            vote: ballot(&collector, 2),
        };
        collector
            .apply(&submit.as_bytes().unwrap(), &mut store)
            .unwrap();
        assert!(store.get_tally().unwrap().is_some());

        let end = serde_json::to_vec(&Transaction::EndVoting).unwrap();
        collector.apply(&end, &mut store).unwrap();
        assert_eq!(store.get_stage().unwrap(), Stage::Ended);

        assert!(collector.apply(br#"{"type": "bogus"}"#, &mut store).is_err());
        assert!(matches!(
            collector.apply(b"  ", &mut store),
            Err(Error::UnknownPayloadFormat)
        ));
    }

    #[test]
    fn test_transaction_format() {
        let tx = Transaction::SubmitVote {
            vote: "abc".to_owned(),
        };
        let json = serde_json::to_string(&tx).unwrap();
        assert_eq!(json, r#"{"type":"submit_vote","vote":"abc"}"#);
        assert_eq!(Transaction::from_bytes(json.as_bytes()).unwrap(), tx);
        assert_eq!(Transaction::from_bytes(&tx.as_bytes().unwrap()).unwrap(), tx);
        assert_eq!(tx.name(), "submit_vote");
    }
}
