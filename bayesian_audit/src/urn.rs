/*!
Polya's urn, used as a sequential Bayesian bootstrap.

The urn starts with the prior ballots and the observed sample. Every draw
picks one element uniformly among everything in the urn so far (including
the elements added by previous draws) and puts a copy of it back. Ballots
never change, so the urn only stores indices into the seed ballots.
*/

use rand::Rng;

/// Returns a completion of length `r` of the observed sample.
///
/// The observed sample is returned verbatim as the prefix, followed by
/// `r - observed.len()` synthetic draws. The prior ballots are used to seed
/// the urn but are not part of the result.
///
/// If the observed sample already has `r` elements or more, it is returned
/// as is.
pub fn urn<'a, B, R: Rng + ?Sized>(
    prior: &'a [B],
    observed: &'a [B],
    r: usize,
    rng: &mut R,
) -> Vec<&'a B> {
    let num_seeds = prior.len() + observed.len();
    let num_draws = r.saturating_sub(observed.len());
    let seed = move |idx: usize| -> &'a B {
        if idx < prior.len() {
            &prior[idx]
        } else {
            &observed[idx - prior.len()]
        }
    };

    // The arena of the urn: indices of seed ballots.
    let mut arena: Vec<usize> = Vec::with_capacity(num_seeds + num_draws);
    arena.extend(0..num_seeds);
    if num_seeds > 0 {
        for _ in 0..num_draws {
            let picked = arena[rng.gen_range(0..arena.len())];
            arena.push(picked);
        }
    }

    arena[prior.len()..].iter().map(|&idx| seed(idx)).collect()
}
