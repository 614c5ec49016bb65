// Social choice functions: from a full set of ballots to an outcome.

use log::debug;
use std::collections::{HashMap, HashSet};

use crate::config::*;
use crate::tiebreak::preference_ranks;

/// A social choice function.
///
/// Implementations must be pure: the outcome only depends on the multiset
/// of ballots, not on their order, and equivalent results must be returned
/// as equal outcomes. The audit tallies outcomes across trials and relies
/// on this.
pub trait SocialChoice: Send + Sync {
    fn name(&self) -> &str;

    fn outcome(&self, candidates: &[CandidateId], sample: &[&Ballot]) -> Outcome;
}

#[derive(Eq, PartialEq, Debug, Clone, Copy, PartialOrd, Ord, Hash)]
struct Points(u64);

/// Borda count.
///
/// A ballot gives `m - 1 - position` points to the candidate at `position`
/// (0 is the most preferred) and nothing to the candidates it does not
/// rank. The outcome is the full ranking of the candidates by decreasing
/// total.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Borda {
    pub tiebreak_mode: TieBreakMode,
}

impl Borda {
    pub fn new(tiebreak_mode: TieBreakMode) -> Borda {
        Borda { tiebreak_mode }
    }

    fn scores(candidates: &[CandidateId], sample: &[&Ballot]) -> HashMap<CandidateId, Points> {
        let m = candidates.len() as u64;
        let mut tally: HashMap<CandidateId, Points> =
            candidates.iter().map(|cid| (*cid, Points(0))).collect();
        for ballot in sample.iter() {
            for (pos, cid) in ballot.ranks().iter().enumerate() {
                if let Some(p) = tally.get_mut(cid) {
                    p.0 += m.saturating_sub(1 + pos as u64);
                }
            }
        }
        tally
    }
}

impl Default for Borda {
    fn default() -> Self {
        Borda::new(TieBreakMode::UseCandidateOrder)
    }
}

impl SocialChoice for Borda {
    fn name(&self) -> &str {
        "borda"
    }

    fn outcome(&self, candidates: &[CandidateId], sample: &[&Ballot]) -> Outcome {
        let tally = Borda::scores(candidates, sample);
        let ranks = preference_ranks(candidates, &self.tiebreak_mode);
        let mut sorted: Vec<(CandidateId, Points)> =
            tally.iter().map(|(cid, p)| (*cid, *p)).collect();
        sorted.sort_by_key(|(cid, p)| {
            (
                std::cmp::Reverse(*p),
                ranks.get(cid).cloned().unwrap_or(usize::MAX),
            )
        });
        Outcome(sorted.into_iter().map(|(cid, _)| cid).collect())
    }
}

/// Instant-runoff voting: the single transferable vote with elimination
/// of the weakest candidate at each round.
///
/// With several seats, the ballots of an elected candidate move on to their
/// next preference at full value (there is no surplus transfer).
/// The outcome is the set of elected candidates, sorted by id.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct InstantRunoff {
    pub tiebreak_mode: TieBreakMode,
    pub number_of_winners: usize,
}

impl InstantRunoff {
    pub fn new(tiebreak_mode: TieBreakMode) -> InstantRunoff {
        InstantRunoff {
            tiebreak_mode,
            number_of_winners: 1,
        }
    }
}

impl Default for InstantRunoff {
    fn default() -> Self {
        InstantRunoff::new(TieBreakMode::UseCandidateOrder)
    }
}

// The first preference of a ballot among the continuing candidates.
// Exhausted ballots return None.
fn first_valid(ballot: &Ballot, continuing: &HashSet<CandidateId>) -> Option<CandidateId> {
    ballot
        .ranks()
        .iter()
        .find(|cid| continuing.contains(*cid))
        .cloned()
}

fn compute_tally(
    sample: &[&Ballot],
    continuing: &HashSet<CandidateId>,
) -> (HashMap<CandidateId, u64>, u64) {
    let mut tally: HashMap<CandidateId, u64> = continuing.iter().map(|cid| (*cid, 0)).collect();
    let mut exhausted: u64 = 0;
    for ballot in sample.iter() {
        match first_valid(ballot, continuing) {
            Some(cid) => *tally.entry(cid).or_insert(0) += 1,
            None => exhausted += 1,
        }
    }
    (tally, exhausted)
}

impl SocialChoice for InstantRunoff {
    fn name(&self) -> &str {
        "irv"
    }

    fn outcome(&self, candidates: &[CandidateId], sample: &[&Ballot]) -> Outcome {
        let ranks = preference_ranks(candidates, &self.tiebreak_mode);
        let seats = self.number_of_winners.max(1);
        let mut continuing: HashSet<CandidateId> = candidates.iter().cloned().collect();
        let mut elected: Vec<CandidateId> = Vec::new();

        while elected.len() < seats && !continuing.is_empty() {
            // The remaining seats go to the remaining candidates.
            if continuing.len() + elected.len() <= seats {
                elected.extend(continuing.drain());
                break;
            }
            let (tally, exhausted) = compute_tally(sample, &continuing);
            let active: u64 = tally.values().sum();
            debug!(
                "InstantRunoff: tally {:?}, exhausted {}, active {}",
                tally, exhausted, active
            );

            // Droop quota of the non-exhausted ballots. With a single seat,
            // this is the majority.
            let threshold = active / (seats as u64 + 1) + 1;
            let winner = tally
                .iter()
                .filter(|(_, count)| active > 0 && **count >= threshold)
                .max_by_key(|(cid, count)| {
                    (
                        **count,
                        std::cmp::Reverse(ranks.get(*cid).cloned().unwrap_or(usize::MAX)),
                    )
                })
                .map(|(cid, _)| *cid);
            if let Some(winner) = winner {
                continuing.remove(&winner);
                elected.push(winner);
                continue;
            }

            // Exclude the weakest candidate. Among ties, the least preferred
            // one by the tiebreak order.
            let min_count = tally.values().min().cloned().unwrap_or(0);
            let excluded = tally
                .iter()
                .filter(|(_, count)| **count == min_count)
                .map(|(cid, _)| *cid)
                .max_by_key(|cid| ranks.get(cid).cloned().unwrap_or(usize::MAX));
            match excluded {
                Some(cid) => {
                    debug!("InstantRunoff: excluding {} with {} votes", cid, min_count);
                    continuing.remove(&cid);
                }
                None => break,
            }
        }
        elected.sort();
        Outcome(elected)
    }
}
