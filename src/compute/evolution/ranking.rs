//! Multi-objective ranking: non-dominated sorting with crowding distance.

use std::cmp::Ordering;

use crate::compute::measures::Scores;

/// Position of a population member in the crowded-comparison order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankedIndex {
    /// Index into the scored slice.
    pub index: usize,
    /// Non-dominated front, 0 being the Pareto front.
    pub rank: usize,
    /// Crowding distance within the front. Boundary points are infinite.
    pub crowding: f64,
}

/// Crowded comparison: lower rank first, then larger crowding distance,
/// then lower index.
pub fn crowded_cmp(a: &RankedIndex, b: &RankedIndex) -> Ordering {
    a.rank
        .cmp(&b.rank)
        .then_with(|| b.crowding.total_cmp(&a.crowding))
        .then_with(|| a.index.cmp(&b.index))
}

/// Partition indices into successive non-dominated fronts.
///
/// Each front lists indices in ascending order.
pub fn non_dominated_sort(scores: &[Scores]) -> Vec<Vec<usize>> {
    let n = scores.len();
    let mut dominated_by_count = vec![0usize; n];
    let mut dominates: Vec<Vec<usize>> = vec![Vec::new(); n];

    for i in 0..n {
        for j in (i + 1)..n {
            if scores[i].dominates(&scores[j]) {
                dominates[i].push(j);
                dominated_by_count[j] += 1;
            } else if scores[j].dominates(&scores[i]) {
                dominates[j].push(i);
                dominated_by_count[i] += 1;
            }
        }
    }

    let mut fronts = Vec::new();
    let mut current: Vec<usize> = (0..n).filter(|&i| dominated_by_count[i] == 0).collect();
    while !current.is_empty() {
        let mut next = Vec::new();
        for &i in &current {
            for &j in &dominates[i] {
                dominated_by_count[j] -= 1;
                if dominated_by_count[j] == 0 {
                    next.push(j);
                }
            }
        }
        next.sort_unstable();
        fronts.push(std::mem::replace(&mut current, next));
    }
    fronts
}

/// Crowding distance of each member of `front`, aligned with `front`.
pub fn crowding_distances(scores: &[Scores], front: &[usize]) -> Vec<f64> {
    let len = front.len();
    let mut distances = vec![0.0; len];
    if len <= 2 {
        return vec![f64::INFINITY; len];
    }

    let objectives: [fn(&Scores) -> f64; 2] = [|s| s.complexity, |s| s.informativity];
    for objective in objectives {
        let mut order: Vec<usize> = (0..len).collect();
        order.sort_by(|&a, &b| {
            objective(&scores[front[a]])
                .total_cmp(&objective(&scores[front[b]]))
                .then_with(|| front[a].cmp(&front[b]))
        });

        let lo = objective(&scores[front[order[0]]]);
        let hi = objective(&scores[front[order[len - 1]]]);
        distances[order[0]] = f64::INFINITY;
        distances[order[len - 1]] = f64::INFINITY;

        let range = hi - lo;
        if range <= 0.0 {
            continue;
        }
        for k in 1..len - 1 {
            let prev = objective(&scores[front[order[k - 1]]]);
            let next = objective(&scores[front[order[k + 1]]]);
            distances[order[k]] += (next - prev) / range;
        }
    }
    distances
}

/// Rank every member, best first under [`crowded_cmp`].
pub fn rank(scores: &[Scores]) -> Vec<RankedIndex> {
    let mut ranked = Vec::with_capacity(scores.len());
    for (rank, front) in non_dominated_sort(scores).iter().enumerate() {
        let crowding = crowding_distances(scores, front);
        ranked.extend(
            front
                .iter()
                .zip(crowding)
                .map(|(&index, crowding)| RankedIndex {
                    index,
                    rank,
                    crowding,
                }),
        );
    }
    ranked.sort_by(crowded_cmp);
    ranked
}
