// ********* Input data structures ***********

use std::error::Error;
use std::fmt::Display;

/// The internal identifier of a registered candidate.
///
/// Identifiers are assigned in registration order, starting at 1.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd)]
pub struct CandidateId(pub u32);

impl Display for CandidateId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Candidate {
    pub name: String,
    pub code: Option<String>,
    pub excluded: bool,
}

/// A single cast ballot: the candidates in decreasing order of preference.
///
/// A ballot may be partial. Candidates that are not mentioned are
/// preferred less than all the mentioned ones.
///
/// The audit engine never looks inside a ballot: it only stores it, copies
/// references to it and hands it to the social choice function.
#[derive(Eq, PartialEq, Debug, Clone, Hash, Ord, PartialOrd)]
pub struct Ballot {
    ranks: Vec<CandidateId>,
}

impl Ballot {
    pub fn new(ranks: Vec<CandidateId>) -> Ballot {
        Ballot { ranks }
    }

    /// The ballot expressing a single preference, used for the Bayesian prior.
    pub fn single(cid: CandidateId) -> Ballot {
        Ballot { ranks: vec![cid] }
    }

    pub fn ranks(&self) -> &[CandidateId] {
        &self.ranks
    }
}

// ******** Output data structures *********

/// The result of a social choice function, in a canonical order.
///
/// Two evaluations of equivalent results compare equal, so outcomes can be
/// tallied in a hash map.
#[derive(Eq, PartialEq, Debug, Clone, Hash, Ord, PartialOrd)]
pub struct Outcome(pub Vec<CandidateId>);

impl Outcome {
    pub fn candidates(&self) -> &[CandidateId] {
        &self.0
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum AuditStatus {
    /// One outcome appeared in at least `trials * (1 - alpha)` trials.
    Confirmed,
    /// All the ballots were drawn before the audit reached confidence.
    /// The audit is inconclusive and requires a full manual count.
    Exhausted,
    /// The caller-imposed limit on the number of rounds was hit.
    RoundLimit,
}

/// Statistics for one round
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct RoundStats {
    pub round: u32,
    /// Number of real ballots observed at the end of the sampling step.
    pub sample_size: usize,
    pub best_outcome: Outcome,
    pub frequency: u32,
    pub distinct_outcomes: usize,
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct AuditResult {
    pub status: AuditStatus,
    /// The certified outcome. Only set when the status is `Confirmed`.
    pub outcome: Option<Outcome>,
    pub samples_examined: usize,
    /// Number of rounds that ran trials. Always `round_stats.len()`.
    pub rounds: u32,
    /// When the whole population got drawn, the outcome of the full count.
    pub full_count: Option<Outcome>,
    pub round_stats: Vec<RoundStats>,
}

/// Errors that prevent an audit from starting.
#[derive(PartialEq, Debug, Clone)]
pub enum AuditErrors {
    InvalidRiskLimit(f64),
    InvalidBatchSize,
    InvalidTrials,
    InvalidRoundLimit,
    EmptyElection,
    DuplicateCandidate(String),
    UnknownCandidate(String),
    InconsistentTieBreak(String),
}

impl Error for AuditErrors {}

impl Display for AuditErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuditErrors::InvalidRiskLimit(alpha) => {
                write!(f, "risk limit must be in [0, 1), got {}", alpha)
            }
            AuditErrors::InvalidBatchSize => write!(f, "batch size must be at least 1"),
            AuditErrors::InvalidTrials => write!(f, "number of trials must be at least 1"),
            AuditErrors::InvalidRoundLimit => write!(f, "round limit must be at least 1"),
            AuditErrors::EmptyElection => write!(f, "the election has no candidates"),
            AuditErrors::DuplicateCandidate(name) => {
                write!(f, "candidate registered twice: {}", name)
            }
            AuditErrors::UnknownCandidate(name) => write!(f, "unknown candidate: {}", name),
            AuditErrors::InconsistentTieBreak(msg) => {
                write!(f, "inconsistent tie-breaking events: {}", msg)
            }
        }
    }
}

// ********* Configuration **********

/// How to order candidates that are tied.
///
/// In every mode, the candidate that comes first is the preferred one: it
/// is ranked higher by Borda, and it is the one kept when one candidate
/// must be excluded.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum TieBreakMode {
    UseCandidateOrder,
    /// Sorts the candidates by the SHA-256 of their id concatenated with
    /// the given string. Hard to guess in advance, but reproducible.
    Hash(String),
    /// An explicit order, for instance the one recovered from the
    /// tie-breaking decisions of the official count.
    LinearOrder(Vec<CandidateId>),
}

/// The control parameters of the sequential audit.
#[derive(PartialEq, Debug, Clone)]
pub struct AuditParams {
    /// Risk tolerance.
    pub alpha: f64,
    /// Number of ballots added to the sample at each round.
    pub batch_size: usize,
    /// Number of urn completions evaluated at each round.
    pub trials: u32,
    pub max_rounds: Option<u32>,
}

impl AuditParams {
    pub const DEFAULT_PARAMS: AuditParams = AuditParams {
        alpha: 0.05,
        batch_size: 4,
        trials: 100,
        max_rounds: None,
    };

    pub fn validate(&self) -> Result<(), AuditErrors> {
        // Written so that NaN is rejected as well.
        if !(self.alpha >= 0.0 && self.alpha < 1.0) {
            return Err(AuditErrors::InvalidRiskLimit(self.alpha));
        }
        if self.batch_size == 0 {
            return Err(AuditErrors::InvalidBatchSize);
        }
        if self.trials == 0 {
            return Err(AuditErrors::InvalidTrials);
        }
        if self.max_rounds == Some(0) {
            return Err(AuditErrors::InvalidRoundLimit);
        }
        Ok(())
    }

    /// The minimum number of agreeing trials to stop the audit.
    pub fn confirmation_threshold(&self) -> f64 {
        self.trials as f64 * (1.0 - self.alpha)
    }
}

impl Default for AuditParams {
    fn default() -> Self {
        AuditParams::DEFAULT_PARAMS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_params_are_valid() {
        assert_eq!(AuditParams::default().validate(), Ok(()));
        assert_eq!(AuditParams::default().confirmation_threshold(), 95.0);
    }

    #[test]
    fn rejects_bad_risk_limits() {
        for alpha in [1.0, 1.5, -0.01, f64::NAN] {
            let p = AuditParams {
                alpha,
                ..AuditParams::DEFAULT_PARAMS
            };
            assert!(matches!(
                p.validate(),
                Err(AuditErrors::InvalidRiskLimit(_))
            ));
        }
        let p = AuditParams {
            alpha: 0.0,
            ..AuditParams::DEFAULT_PARAMS
        };
        assert_eq!(p.validate(), Ok(()));
    }

    #[test]
    fn rejects_empty_batches_and_trials() {
        let p = AuditParams {
            batch_size: 0,
            ..AuditParams::DEFAULT_PARAMS
        };
        assert_eq!(p.validate(), Err(AuditErrors::InvalidBatchSize));
        let p = AuditParams {
            trials: 0,
            ..AuditParams::DEFAULT_PARAMS
        };
        assert_eq!(p.validate(), Err(AuditErrors::InvalidTrials));
    }

    #[test]
    fn rejects_a_zero_round_limit() {
        let p = AuditParams {
            max_rounds: Some(0),
            ..AuditParams::DEFAULT_PARAMS
        };
        assert_eq!(p.validate(), Err(AuditErrors::InvalidRoundLimit));
        let p = AuditParams {
            max_rounds: Some(1),
            ..AuditParams::DEFAULT_PARAMS
        };
        assert_eq!(p.validate(), Ok(()));
    }
}
