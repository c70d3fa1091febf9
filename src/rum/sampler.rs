//! Weighted sampling without replacement
//!
//! Each draw maps a uniform value onto the cumulative weights of the
//! candidates still in the pool. After a pick, the winner's weight is taken
//! out of the running total and out of the cumulative sums of the candidates
//! that followed it, so the next draw sees a renormalized distribution.
//!
//! The caller's endpoints are never touched; cumulative sums live in a
//! working copy owned by the call.

use rand::Rng;

use super::catalog::Endpoint;

struct Candidate<'a> {
    endpoint: &'a Endpoint,
    weight: i64,
    cumulative: i64,
}

/// Select up to `count` distinct eligible endpoints, weight-proportionally.
///
/// `count` is clamped to the number of endpoints with `weight > 0`. A draw
/// that matches no candidate selects nothing, so the result may be shorter
/// than requested.
pub fn sample<'a, R>(endpoints: &'a [Endpoint], count: usize, rng: &mut R) -> Vec<&'a Endpoint>
where
    R: Rng + ?Sized,
{
    let mut total: i64 = 0;
    let mut pool: Vec<Candidate<'a>> = endpoints
        .iter()
        .filter(|e| e.is_eligible())
        .map(|endpoint| {
            total = total.saturating_add(endpoint.weight);
            Candidate {
                endpoint,
                weight: endpoint.weight,
                cumulative: total,
            }
        })
        .collect();

    let draws = count.min(pool.len());
    let mut selected = Vec::with_capacity(draws);

    for _ in 0..draws {
        if total <= 0 {
            break;
        }

        let r = (rng.gen::<f64>() * total as f64).floor() as i64;
        let Some(pos) = pool.iter().position(|c| c.cumulative > r) else {
            continue;
        };

        let picked = pool.remove(pos);
        for later in &mut pool[pos..] {
            later.cumulative -= picked.weight;
        }
        total -= picked.weight;
        selected.push(picked.endpoint);
    }

    selected
}
