// Tie breaking between candidates.
//
// All the modes reduce to a linear preference order over the candidates:
// the candidate that comes first is preferred (ranked higher, or kept when
// someone must be excluded).

use log::{debug, info};
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::{HashMap, HashSet};

use crate::config::*;

/// How a tie was resolved by the official count.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum Resolution {
    /// A single candidate: the one elected (case 2) or excluded (case 3).
    Single(CandidateId),
    /// The order in which the tied candidates were elected (case 1).
    Permutation(Vec<CandidateId>),
}

/// A tie resolved manually during the official count.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct TieBreakEvent {
    pub round: u32,
    pub candidates: Vec<CandidateId>,
    pub resolution: Resolution,
    /// 1: order of election, 2: last vacancy, 3: exclusion.
    pub case: u8,
}

/// Returns the position of each candidate in the preference order.
/// Lower is preferred.
pub(crate) fn preference_ranks(
    candidates: &[CandidateId],
    mode: &TieBreakMode,
) -> HashMap<CandidateId, usize> {
    let ordered: Vec<CandidateId> = match mode {
        TieBreakMode::UseCandidateOrder => candidates.to_vec(),
        TieBreakMode::Hash(tie_break_string) => {
            let mut hashed: Vec<(String, CandidateId)> = candidates
                .iter()
                .map(|cid| (sha256::digest(format!("{}{}", cid, tie_break_string)), *cid))
                .collect();
            hashed.sort();
            hashed.into_iter().map(|(_, cid)| cid).collect()
        }
        TieBreakMode::LinearOrder(order) => {
            // Candidates missing from the order come last, in registration order.
            let mut res: Vec<CandidateId> = order
                .iter()
                .filter(|cid| candidates.contains(cid))
                .cloned()
                .collect();
            for cid in candidates {
                if !res.contains(cid) {
                    res.push(*cid);
                }
            }
            res
        }
    };
    ordered
        .into_iter()
        .enumerate()
        .map(|(idx, cid)| (cid, idx))
        .collect()
}

/// Orders the tied candidates, preferred first.
pub fn break_tie(
    tied: &[CandidateId],
    candidates: &[CandidateId],
    mode: &TieBreakMode,
) -> Vec<CandidateId> {
    let ranks = preference_ranks(candidates, mode);
    let mut res = tied.to_vec();
    res.sort_by_key(|cid| ranks.get(cid).cloned().unwrap_or(usize::MAX));
    res
}

/// Recovers a linear order of the candidates that is consistent with the
/// tie-breaking decisions taken in the official count.
///
/// Each event adds "preferred over" edges between candidates; the order is
/// a random topological sort of the resulting graph. The order is checked
/// against every event before being returned.
pub fn linear_order_from_events<R: Rng + ?Sized>(
    candidates: &[CandidateId],
    events: &[TieBreakEvent],
    rng: &mut R,
) -> Result<Vec<CandidateId>, AuditErrors> {
    let known: HashSet<CandidateId> = candidates.iter().cloned().collect();
    let mut edges: HashMap<CandidateId, Vec<CandidateId>> =
        candidates.iter().map(|cid| (*cid, Vec::new())).collect();

    for event in events.iter() {
        for cid in event.candidates.iter() {
            if !known.contains(cid) {
                return Err(AuditErrors::UnknownCandidate(cid.to_string()));
            }
        }
        match (&event.resolution, event.case) {
            (Resolution::Single(winner), 2) => {
                for cid in event.candidates.iter().filter(|cid| *cid != winner) {
                    debug!("linear_order_from_events: case 2: edge {}->{}", winner, cid);
                    edges.entry(*winner).or_default().push(*cid);
                }
            }
            (Resolution::Single(excluded), _) => {
                for cid in event.candidates.iter().filter(|cid| *cid != excluded) {
                    debug!("linear_order_from_events: case 3: edge {}->{}", cid, excluded);
                    edges.entry(*cid).or_default().push(*excluded);
                }
            }
            (Resolution::Permutation(order), _) => {
                for (idx, src) in order.iter().enumerate() {
                    for dest in order[idx + 1..].iter() {
                        debug!("linear_order_from_events: case 1: edge {}->{}", src, dest);
                        edges.entry(*src).or_default().push(*dest);
                    }
                }
            }
        }
    }

    let mut vertices: Vec<CandidateId> = candidates.to_vec();
    vertices.shuffle(rng);
    // Reversed post-order of a depth first search.
    let mut post_order: Vec<CandidateId> = Vec::new();
    let mut visited: HashSet<CandidateId> = HashSet::new();
    for v in vertices {
        visit(v, &edges, &mut visited, &mut post_order, rng);
    }
    post_order.reverse();
    info!("Tie-breaking linear order: {:?}", post_order);

    let mode = TieBreakMode::LinearOrder(post_order.clone());
    for event in events.iter() {
        let ordered = break_tie(&event.candidates, candidates, &mode);
        let consistent = match (&event.resolution, event.case) {
            (Resolution::Single(winner), 2) => ordered.first() == Some(winner),
            (Resolution::Single(excluded), _) => ordered.last() == Some(excluded),
            (Resolution::Permutation(order), _) => {
                break_tie(order, candidates, &mode) == *order
            }
        };
        if !consistent {
            return Err(AuditErrors::InconsistentTieBreak(format!(
                "round {}: {:?} cannot be resolved as {:?}",
                event.round, event.candidates, event.resolution
            )));
        }
    }
    Ok(post_order)
}

fn visit<R: Rng + ?Sized>(
    v: CandidateId,
    edges: &HashMap<CandidateId, Vec<CandidateId>>,
    visited: &mut HashSet<CandidateId>,
    post_order: &mut Vec<CandidateId>,
    rng: &mut R,
) {
    if !visited.insert(v) {
        return;
    }
    let mut next: Vec<CandidateId> = edges.get(&v).cloned().unwrap_or_default();
    next.shuffle(rng);
    for u in next {
        visit(u, edges, visited, post_order, rng);
    }
    post_order.push(v);
}
