// The sequential audit procedure.

use log::{debug, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use std::collections::HashMap;

use crate::config::*;
use crate::election::Election;
use crate::urn::urn;

/// The phases of the audit.
///
/// A round goes through `Sampling`, `Trialing` and `Deciding`, then either
/// loops back to `Sampling` or ends in one of the terminal phases.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum AuditPhase {
    Sampling,
    Trialing,
    Deciding,
    Confirmed(Outcome),
    Exhausted,
    RoundLimit,
}

impl AuditPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AuditPhase::Confirmed(_) | AuditPhase::Exhausted | AuditPhase::RoundLimit
        )
    }
}

/// The state of an audit in progress.
///
/// The observed sample only grows, one batch per round.
pub struct AuditState {
    params: AuditParams,
    phase: AuditPhase,
    observed: Vec<Ballot>,
    num_ballots: usize,
    round: u32,
    full_count: Option<Outcome>,
    round_stats: Vec<RoundStats>,
}

/// The outcomes of one round of trials, with their frequencies.
type OutcomeTally = HashMap<Outcome, u32>;

impl AuditState {
    /// Checks the parameters. No ballot is drawn before this succeeds.
    pub fn new<E: Election>(election: &E, params: &AuditParams) -> Result<AuditState, AuditErrors> {
        params.validate()?;
        if election.candidates().is_empty() {
            return Err(AuditErrors::EmptyElection);
        }
        Ok(AuditState {
            params: params.clone(),
            phase: AuditPhase::Sampling,
            observed: Vec::new(),
            num_ballots: election.num_ballots(),
            round: 0,
            full_count: None,
            round_stats: Vec::new(),
        })
    }

    pub fn phase(&self) -> &AuditPhase {
        &self.phase
    }

    pub fn observed(&self) -> &[Ballot] {
        &self.observed
    }

    pub fn rounds(&self) -> u32 {
        self.round
    }

    pub fn round_stats(&self) -> &[RoundStats] {
        &self.round_stats
    }

    /// Runs one full round: sampling, trials and decision.
    ///
    /// Does nothing if the audit already ended.
    pub fn run_round<E: Election, R: Rng + ?Sized>(
        &mut self,
        election: &mut E,
        rng: &mut R,
    ) -> &AuditPhase {
        if self.phase.is_terminal() {
            return &self.phase;
        }
        self.phase = AuditPhase::Sampling;
        if !self.sample(election) {
            return &self.phase;
        }
        // Only the rounds that run trials are counted.
        self.round += 1;

        self.phase = AuditPhase::Trialing;
        let tally = self.run_trials(election, rng);

        self.phase = AuditPhase::Deciding;
        self.phase = self.decide(&tally);
        debug!("Round {}: now in phase {:?}", self.round, self.phase);
        &self.phase
    }

    // Returns false if the audit cannot go on.
    fn sample<E: Election>(&mut self, election: &mut E) -> bool {
        let round = self.round + 1;
        let increment = election.draw_ballots(self.params.batch_size);
        if increment.is_empty() {
            info!(
                "Round {}: all the ballots have been drawn ({} examined). The audit is exhausted.",
                round,
                self.observed.len()
            );
            self.phase = AuditPhase::Exhausted;
            return false;
        }
        self.observed.extend(increment);
        info!(
            "Round {}: sample size is now {} of {}",
            round,
            self.observed.len(),
            self.num_ballots
        );
        if self.observed.len() >= self.num_ballots {
            let refs: Vec<&Ballot> = self.observed.iter().collect();
            let outcome = election.scf(&refs);
            info!(
                "Round {}: the whole population was drawn, full count outcome: {:?}",
                round, outcome
            );
            self.full_count = Some(outcome);
            self.phase = AuditPhase::Exhausted;
            return false;
        }
        true
    }

    fn run_trials<E: Election, R: Rng + ?Sized>(&self, election: &E, rng: &mut R) -> OutcomeTally {
        // One independent generator per trial, seeded up front so that the
        // result does not depend on the scheduling of the trials.
        let seeds: Vec<u64> = (0..self.params.trials).map(|_| rng.gen::<u64>()).collect();
        let prior = election.prior_ballots();
        let observed: &[Ballot] = &self.observed;
        let n = self.num_ballots;
        let outcomes: Vec<Outcome> = seeds
            .par_iter()
            .map(|seed| {
                let mut trial_rng = StdRng::seed_from_u64(*seed);
                let full_urn = urn(prior, observed, n, &mut trial_rng);
                election.scf(&full_urn)
            })
            .collect();

        let mut tally: OutcomeTally = HashMap::new();
        for outcome in outcomes {
            *tally.entry(outcome).or_insert(0) += 1;
        }
        debug!("Round {}: outcomes {:?}", self.round, tally);
        tally
    }

    fn decide(&mut self, tally: &OutcomeTally) -> AuditPhase {
        // Most frequent outcome. Among equally frequent ones, the smallest.
        let best = tally
            .iter()
            .max_by(|(o1, f1), (o2, f2)| f1.cmp(f2).then_with(|| o2.cmp(o1)))
            .map(|(o, f)| (o.clone(), *f));
        let (best, freq) = match best {
            Some(x) => x,
            None => return AuditPhase::Exhausted,
        };
        info!(
            "Round {}: most common outcome {:?}, frequency {} of {}",
            self.round, best, freq, self.params.trials
        );
        self.round_stats.push(RoundStats {
            round: self.round,
            sample_size: self.observed.len(),
            best_outcome: best.clone(),
            frequency: freq,
            distinct_outcomes: tally.len(),
        });

        // TODO: replace the frequency threshold by a proven risk-limiting bound.
        if freq as f64 >= self.params.confirmation_threshold() {
            info!("Round {}: the audit confirms the outcome {:?}", self.round, best);
            return AuditPhase::Confirmed(best);
        }
        if let Some(max_rounds) = self.params.max_rounds {
            if self.round >= max_rounds {
                info!("Round {}: stopping, round limit reached", self.round);
                return AuditPhase::RoundLimit;
            }
        }
        AuditPhase::Sampling
    }

    pub fn result(&self) -> AuditResult {
        let (status, outcome) = match &self.phase {
            AuditPhase::Confirmed(o) => (AuditStatus::Confirmed, Some(o.clone())),
            AuditPhase::RoundLimit => (AuditStatus::RoundLimit, None),
            _ => (AuditStatus::Exhausted, None),
        };
        AuditResult {
            status,
            outcome,
            samples_examined: self.observed.len(),
            rounds: self.round,
            full_count: self.full_count.clone(),
            round_stats: self.round_stats.clone(),
        }
    }
}

/// Runs a Bayesian audit of the election.
///
/// Arguments:
/// * `election` the election to audit, as a source of ballots
/// * `params` the control parameters, checked before any ballot is drawn
/// * `rng` the source of randomness for the trials
pub fn audit<E: Election, R: Rng + ?Sized>(
    election: &mut E,
    params: &AuditParams,
    rng: &mut R,
) -> Result<AuditResult, AuditErrors> {
    let mut state = AuditState::new(election, params)?;
    info!(
        "Audit: {} candidates, {} ballots cast, parameters: {:?}",
        election.candidates().len(),
        election.num_ballots(),
        params
    );
    for cid in election.candidates().iter() {
        info!("Candidate: {}: {}", cid, election.candidate_name(*cid));
    }
    while !state.run_round(election, rng).is_terminal() {}
    Ok(state.result())
}
