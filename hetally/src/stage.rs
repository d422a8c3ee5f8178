use crate::*;
use num_enum::TryFromPrimitive;

/// Lifecycle of a voting round
#[derive(Serialize, Deserialize, TryFromPrimitive, Copy, Debug, Clone, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum Stage {
    /// No round configured yet
    Closed = 0,

    /// Ballots are accepted
    Ongoing = 1,

    /// Terminal: the tally is frozen for retrieval and decryption
    Ended = 2,
}

impl Default for Stage {
    fn default() -> Self {
        Stage::Closed
    }
}

impl Stage {
    /// Ledger encoding: the decimal integer code
    pub fn to_state(self) -> Vec<u8> {
        (self as u8).to_string().into_bytes()
    }

    pub fn from_state(bytes: &[u8]) -> Result<Self, Error> {
        let corrupt = || Error::CorruptState(STAGE_KEY.to_owned());
        let code: u8 = std::str::from_utf8(bytes)
            .map_err(|_| corrupt())?
            .trim()
            .parse()
            .map_err(|_| corrupt())?;
        Stage::try_from_primitive(code).map_err(|_| corrupt())
    }

    /// Fails unless ballots may be submitted
    pub fn assert_ongoing(self) -> Result<(), Error> {
        match self {
            Stage::Ongoing => Ok(()),
            other => Err(Error::StageViolation(other)),
        }
    }

    /// Round setup
    pub fn instantiate(self) -> Result<Stage, Error> {
        match self {
            Stage::Closed | Stage::Ongoing => Ok(Stage::Ongoing),
            Stage::Ended => Err(Error::InvalidTransition {
                from: self,
                to: Stage::Ongoing,
            }),
        }
    }

    /// Close the round
    pub fn end(self) -> Result<Stage, Error> {
        match self {
            Stage::Ongoing => Ok(Stage::Ended),
            other => Err(Error::StageViolation(other)),
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let name = match self {
            Stage::Closed => "closed",
            Stage::Ongoing => "ongoing",
            Stage::Ended => "ended",
        };
        write!(f, "{}", name)
    }
}
