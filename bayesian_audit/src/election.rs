// Ballot sources: the elections that can be audited.

use log::{debug, info};
use rand::seq::SliceRandom;
use rand::Rng;

use crate::config::*;
use crate::scf::{Borda, SocialChoice};

/// An election, seen by the audit as a source of ballots.
///
/// `draw_ballots` is the only mutating operation. It is called once per
/// round and completes before the trials of that round start, so the
/// other operations only need shared access and can be used from several
/// threads.
pub trait Election: Sync {
    /// The registered candidates, in registration order.
    fn candidates(&self) -> &[CandidateId];

    /// Total number of cast ballots.
    fn num_ballots(&self) -> usize;

    /// The synthetic ballots encoding the Bayesian prior.
    fn prior_ballots(&self) -> &[Ballot];

    /// Returns up to `k` ballots that were never returned before.
    ///
    /// An empty result means that all the ballots have been drawn.
    fn draw_ballots(&mut self, k: usize) -> Vec<Ballot>;

    /// The social choice function of this election.
    fn scf(&self, sample: &[&Ballot]) -> Outcome;

    fn candidate_name(&self, cid: CandidateId) -> String {
        cid.to_string()
    }
}

fn make_prior(candidates: &[CandidateId]) -> Vec<Ballot> {
    candidates.iter().map(|cid| Ballot::single(*cid)).collect()
}

/// A simulated election, for testing.
///
/// Each ballot is biased so that `(1, 2, ..., m)` is likely to be the
/// outcome: for every ballot, the candidate at position `i` gets the value
/// `i + bias * U(0, 1)` and the ballot lists the candidates by increasing
/// value. A large `bias` means a lot of noise and almost no preference.
pub struct SimulatedElection<R: Rng> {
    candidates: Vec<CandidateId>,
    prior: Vec<Ballot>,
    num_ballots: usize,
    bias: f64,
    ballots_drawn: usize,
    scf: Borda,
    rng: R,
}

impl<R: Rng> SimulatedElection<R> {
    pub fn new(m: u32, n: usize, bias: f64, rng: R) -> SimulatedElection<R> {
        let candidates: Vec<CandidateId> = (1..=m).map(CandidateId).collect();
        let prior = make_prior(&candidates);
        SimulatedElection {
            candidates,
            prior,
            num_ballots: n,
            bias,
            ballots_drawn: 0,
            scf: Borda::default(),
            rng,
        }
    }

    pub fn ballots_drawn(&self) -> usize {
        self.ballots_drawn
    }

    fn make_ballot(&mut self) -> Ballot {
        let bias = self.bias;
        let rng = &mut self.rng;
        let mut values: Vec<(f64, CandidateId)> = self
            .candidates
            .iter()
            .enumerate()
            .map(|(idx, cid)| (idx as f64 + bias * rng.gen::<f64>(), *cid))
            .collect();
        values.sort_by(|a, b| a.0.total_cmp(&b.0));
        Ballot::new(values.into_iter().map(|(_, cid)| cid).collect())
    }
}

impl<R: Rng + Sync> Election for SimulatedElection<R> {
    fn candidates(&self) -> &[CandidateId] {
        &self.candidates
    }

    fn num_ballots(&self) -> usize {
        self.num_ballots
    }

    fn prior_ballots(&self) -> &[Ballot] {
        &self.prior
    }

    fn draw_ballots(&mut self, k: usize) -> Vec<Ballot> {
        let k = k.min(self.num_ballots - self.ballots_drawn);
        let res: Vec<Ballot> = (0..k).map(|_| self.make_ballot()).collect();
        self.ballots_drawn += k;
        debug!(
            "SimulatedElection: drew {} ballots, {} of {} drawn",
            k, self.ballots_drawn, self.num_ballots
        );
        res
    }

    fn scf(&self, sample: &[&Ballot]) -> Outcome {
        self.scf.outcome(&self.candidates, sample)
    }
}

/// An election backed by real ballots.
///
/// The population is shuffled once at construction and drawn from front to
/// back. The social choice function is provided by the caller.
pub struct RealElection<S: SocialChoice> {
    registered: Vec<Candidate>,
    candidates: Vec<CandidateId>,
    prior: Vec<Ballot>,
    remaining: Vec<Ballot>,
    num_ballots: usize,
    ballots_drawn: usize,
    scf: S,
}

impl<S: SocialChoice> RealElection<S> {
    /// Candidates receive the ids `1..=m` in the order given.
    pub fn new<R: Rng + ?Sized>(
        registered: Vec<Candidate>,
        mut ballots: Vec<Ballot>,
        scf: S,
        rng: &mut R,
    ) -> Result<RealElection<S>, AuditErrors> {
        if registered.is_empty() {
            return Err(AuditErrors::EmptyElection);
        }
        let candidates: Vec<CandidateId> = (1..=registered.len() as u32).map(CandidateId).collect();
        for b in ballots.iter() {
            if let Some(cid) = b.ranks().iter().find(|cid| !candidates.contains(cid)) {
                return Err(AuditErrors::UnknownCandidate(cid.to_string()));
            }
        }
        info!(
            "Real election: {} candidates, {} ballots, social choice function: {}",
            registered.len(),
            ballots.len(),
            scf.name()
        );
        ballots.shuffle(rng);
        let prior = make_prior(&candidates);
        Ok(RealElection {
            registered,
            candidates,
            prior,
            num_ballots: ballots.len(),
            remaining: ballots,
            ballots_drawn: 0,
            scf,
        })
    }

    pub fn ballots_drawn(&self) -> usize {
        self.ballots_drawn
    }
}

impl<S: SocialChoice> Election for RealElection<S> {
    fn candidates(&self) -> &[CandidateId] {
        &self.candidates
    }

    fn num_ballots(&self) -> usize {
        self.num_ballots
    }

    fn prior_ballots(&self) -> &[Ballot] {
        &self.prior
    }

    fn draw_ballots(&mut self, k: usize) -> Vec<Ballot> {
        let start = self.ballots_drawn;
        let end = (start + k).min(self.remaining.len());
        self.ballots_drawn = end;
        debug!(
            "RealElection: drew ballots {}..{} of {}",
            start, end, self.num_ballots
        );
        self.remaining[start..end].to_vec()
    }

    fn scf(&self, sample: &[&Ballot]) -> Outcome {
        self.scf.outcome(&self.candidates, sample)
    }

    fn candidate_name(&self, cid: CandidateId) -> String {
        self.registered
            .get((cid.0 as usize).wrapping_sub(1))
            .map(|c| c.name.clone())
            .unwrap_or_else(|| cid.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scf::InstantRunoff;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;

    fn candidate(name: &str) -> Candidate {
        Candidate {
            name: name.to_string(),
            code: None,
            excluded: false,
        }
    }

    #[test]
    fn simulated_draws_are_clamped() {
        let mut e = SimulatedElection::new(3, 10, 1.0, StdRng::seed_from_u64(1));
        assert_eq!(e.draw_ballots(4).len(), 4);
        assert_eq!(e.draw_ballots(4).len(), 4);
        assert_eq!(e.draw_ballots(4).len(), 2);
        assert!(e.draw_ballots(4).is_empty());
        assert!(e.draw_ballots(4).is_empty());
        assert_eq!(e.ballots_drawn(), 10);
    }

    #[test]
    fn simulated_ballots_are_permutations() {
        let mut e = SimulatedElection::new(5, 50, 2.0, StdRng::seed_from_u64(2));
        for b in e.draw_ballots(50) {
            let mut ranks = b.ranks().to_vec();
            ranks.sort();
            assert_eq!(ranks, e.candidates().to_vec());
        }
    }

    #[test]
    fn simulated_prior_has_one_ballot_per_candidate() {
        let e = SimulatedElection::new(4, 10, 5.0, StdRng::seed_from_u64(0));
        assert_eq!(
            e.prior_ballots().to_vec(),
            (1..=4).map(|i| Ballot::single(CandidateId(i))).collect::<Vec<_>>()
        );
    }

    #[test]
    fn real_draws_never_repeat() {
        let mut rng = StdRng::seed_from_u64(3);
        // Distinct ballots, so that duplicates can be detected.
        let population: Vec<Ballot> = (0..20)
            .map(|i| {
                let mut ranks = vec![CandidateId(1 + i % 3)];
                ranks.extend((0..i).map(|_| CandidateId(2)));
                Ballot::new(ranks)
            })
            .collect();
        let mut e = RealElection::new(
            vec![candidate("A"), candidate("B"), candidate("C")],
            population.clone(),
            InstantRunoff::default(),
            &mut rng,
        )
        .unwrap();
        let mut seen: HashSet<Ballot> = HashSet::new();
        let mut total = 0;
        loop {
            let batch = e.draw_ballots(6);
            if batch.is_empty() {
                break;
            }
            assert!(batch.len() <= 6);
            total += batch.len();
            for b in batch {
                assert!(seen.insert(b));
            }
        }
        assert_eq!(total, 20);
        assert_eq!(seen, population.into_iter().collect::<HashSet<_>>());
    }

    #[test]
    fn real_election_checks_candidates() {
        let mut rng = StdRng::seed_from_u64(0);
        let res = RealElection::new(vec![], vec![], Borda::default(), &mut rng);
        assert!(matches!(res, Err(AuditErrors::EmptyElection)));
        let res = RealElection::new(
            vec![candidate("A")],
            vec![Ballot::new(vec![CandidateId(2)])],
            Borda::default(),
            &mut rng,
        );
        assert!(matches!(res, Err(AuditErrors::UnknownCandidate(_))));
    }

    #[test]
    fn real_election_names() {
        let mut rng = StdRng::seed_from_u64(0);
        let e = RealElection::new(
            vec![candidate("Alice"), candidate("Bob")],
            vec![],
            Borda::default(),
            &mut rng,
        )
        .unwrap();
        assert_eq!(e.candidate_name(CandidateId(2)), "Bob");
        assert_eq!(e.candidate_name(CandidateId(7)), "7");
    }
}
