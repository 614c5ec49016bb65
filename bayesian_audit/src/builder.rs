use log::{debug, warn};
use rand::Rng;
use std::collections::{HashMap, HashSet};

pub use crate::config::*;
use crate::election::RealElection;
use crate::scf::SocialChoice;

/// A builder for assembling the ballots of a real election.
///
/// Votes refer to the candidates by name. Votes with a count are expanded
/// into that many identical ballots.
///
/// ```
/// use bayesian_audit::builder::Builder;
/// use bayesian_audit::scf::Borda;
/// # use bayesian_audit::AuditErrors;
/// use rand::rngs::StdRng;
/// use rand::SeedableRng;
///
/// let mut builder = Builder::new().candidates(&["Anna".to_string(), "Bob".to_string()])?;
///
/// builder.add_vote_simple(&["Anna".to_string(), "".to_string(), "Bob".to_string()])?;
/// builder.add_vote(&["Bob".to_string()], 3)?;
///
/// let election = builder.build(Borda::default(), &mut StdRng::seed_from_u64(0))?;
/// # Ok::<(), AuditErrors>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct Builder {
    _candidates: Vec<Candidate>,
    _ids: HashMap<String, CandidateId>,
    _ballots: Vec<Ballot>,
}

impl Builder {
    pub fn new() -> Builder {
        Builder::default()
    }

    /// Registers the candidates. Excluded candidates do not take part in the
    /// audit, and they are dropped from the ballots.
    pub fn candidates_full(self, cands: &[Candidate]) -> Result<Builder, AuditErrors> {
        let registered: Vec<Candidate> = cands.iter().filter(|c| !c.excluded).cloned().collect();
        if registered.is_empty() {
            return Err(AuditErrors::EmptyElection);
        }
        let ids: HashMap<String, CandidateId> = registered
            .iter()
            .enumerate()
            .map(|(idx, c)| (c.name.clone(), CandidateId(idx as u32 + 1)))
            .collect();
        if ids.len() != registered.len() {
            let mut seen: HashSet<&str> = HashSet::new();
            let dup = registered
                .iter()
                .find(|c| !seen.insert(c.name.as_str()))
                .map(|c| c.name.clone())
                .unwrap_or_default();
            return Err(AuditErrors::DuplicateCandidate(dup));
        }
        let excluded: Vec<&String> = cands.iter().filter(|c| c.excluded).map(|c| &c.name).collect();
        if !excluded.is_empty() {
            debug!("Builder: excluded candidates: {:?}", excluded);
        }
        Ok(Builder {
            _candidates: cands.to_vec(),
            _ids: ids,
            _ballots: Vec::new(),
        })
    }

    pub fn candidates(self, cands: &[String]) -> Result<Builder, AuditErrors> {
        let full: Vec<Candidate> = cands
            .iter()
            .map(|name| Candidate {
                name: name.clone(),
                code: None,
                excluded: false,
            })
            .collect();
        self.candidates_full(&full)
    }

    /// Adds a single vote.
    pub fn add_vote_simple(&mut self, candidates: &[String]) -> Result<(), AuditErrors> {
        self.add_vote(candidates, 1)
    }

    /// Adds a vote with a weight attached to it.
    ///
    /// candidates: the choices of the voter, in order of preference. Empty
    /// choices are skipped, and so are the repeated mentions of a candidate.
    /// Any other name must be a registered candidate.
    pub fn add_vote(&mut self, candidates: &[String], count: u64) -> Result<(), AuditErrors> {
        let mut ranks: Vec<CandidateId> = Vec::new();
        for name in candidates.iter().filter(|s| !s.is_empty()) {
            if self.is_excluded(name) {
                continue;
            }
            let cid = match self._ids.get(name) {
                Some(cid) => *cid,
                None => return Err(AuditErrors::UnknownCandidate(name.clone())),
            };
            if ranks.contains(&cid) {
                warn!("Builder: duplicate mention of {} skipped", name);
            } else {
                ranks.push(cid);
            }
        }
        let ballot = Ballot::new(ranks);
        for _ in 0..count {
            self._ballots.push(ballot.clone());
        }
        Ok(())
    }

    fn is_excluded(&self, name: &str) -> bool {
        self._candidates
            .iter()
            .any(|c| c.excluded && c.name == name)
    }

    /// The number of ballots added so far.
    pub fn num_ballots(&self) -> usize {
        self._ballots.len()
    }

    pub fn candidate_id(&self, name: &str) -> Option<CandidateId> {
        self._ids.get(name).cloned()
    }

    /// The ids of the candidates taking part in the audit, in order.
    pub fn candidate_ids(&self) -> Vec<CandidateId> {
        let mut ids: Vec<CandidateId> = self._ids.values().cloned().collect();
        ids.sort();
        ids
    }

    /// Builds the election. The population of ballots is shuffled with
    /// `rng`, which fixes the order in which the audit draws them.
    pub fn build<S: SocialChoice, R: Rng + ?Sized>(
        self,
        scf: S,
        rng: &mut R,
    ) -> Result<RealElection<S>, AuditErrors> {
        let registered: Vec<Candidate> = self
            ._candidates
            .into_iter()
            .filter(|c| !c.excluded)
            .collect();
        RealElection::new(registered, self._ballots, scf, rng)
    }
}
