//! Island topology — isolated subpopulations with ring migration.

use crate::population::Population;

/// Split a total population across `islands` subpopulations, spreading the
/// remainder over the leading islands.
pub fn partition(total: usize, islands: usize) -> Vec<usize> {
    if islands == 0 {
        return Vec::new();
    }
    let base = total / islands;
    let remainder = total % islands;
    (0..islands)
        .map(|i| base + usize::from(i < remainder))
        .collect()
}

/// Ring migration: each island's top `migrants` replace the worst `migrants`
/// of the next island. Migrants keep their evaluated fitness so they compete
/// as parents immediately. Expects islands sorted descending by fitness.
pub fn migrate(islands: &mut [Population], migrants: usize) {
    let n = islands.len();
    if n < 2 || migrants == 0 {
        return;
    }
    let tops: Vec<Vec<_>> = islands
        .iter()
        .map(|island| island.individuals.iter().take(migrants).cloned().collect())
        .collect();
    for (i, top) in tops.into_iter().enumerate() {
        let target = &mut islands[(i + 1) % n];
        let keep = target.individuals.len().saturating_sub(top.len());
        target.individuals.truncate(keep);
        target.individuals.extend(top);
    }
}
