// Weighted random choice over a context's successors.

use crate::chain::{Distribution, NextSymbol};
use markov_midi_prng::SampleRng;

/// Draw one symbol with probability proportional to its count.
///
/// Draws `r` uniformly in `[1, total]` and walks the transitions in
/// first-seen order, subtracting each count until `r` reaches zero. Returns
/// `None` only for an empty distribution, which training never stores.
pub fn pick<'a>(dist: &'a Distribution, rng: &mut SampleRng) -> Option<&'a NextSymbol> {
    if dist.is_empty() {
        return None;
    }
    let mut r = rng.range_u64_inclusive(1, dist.total());
    for t in dist.transitions() {
        if r <= t.count {
            return Some(&t.symbol);
        }
        r -= t.count;
    }
    None
}
