//! Hierarchical k-means used by the reference engine
//!
//! Points are widened to f64 once. A cluster tree is grown from a single
//! root: the leaf with the largest within-cluster cost is repeatedly split
//! into `branching` children by Lloyd iterations, so `m` full splits yield
//! `(branching - 1) * m + 1` leaves. Leaf centroids are the result.

use crate::params::CentersInit;
use rand::prelude::*;

/// Upper bound on Lloyd iterations when running to convergence
const CONVERGENCE_LIMIT: usize = 10_000;

/// Parameters for one flat k-means run
#[derive(Debug, Clone)]
pub struct KMeansParams {
    /// Number of clusters (centroids)
    pub k: usize,
    /// Iteration cap; `None` runs until assignments stop changing
    pub max_iterations: Option<usize>,
    /// Seeding strategy
    pub init: CentersInit,
}

/// Result of one flat k-means run
#[derive(Debug)]
pub struct KMeansResult {
    /// Cluster centroids [k x dimension]
    pub centroids: Vec<Vec<f64>>,
    /// Cluster of each member, parallel to the member list
    pub assignments: Vec<usize>,
    /// Sum of squared distances to assigned centroids
    pub inertia: f64,
    /// Lloyd iterations run
    pub iterations: usize,
    /// Whether assignments stopped changing
    pub converged: bool,
}

#[inline]
fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

fn mean_of(data: &[Vec<f64>], members: &[usize], dimension: usize) -> Vec<f64> {
    let mut center = vec![0.0; dimension];
    for &m in members {
        for (c, &v) in center.iter_mut().zip(&data[m]) {
            *c += v;
        }
    }
    let n = members.len().max(1) as f64;
    center.iter_mut().for_each(|c| *c /= n);
    center
}

fn closest(point: &[f64], centroids: &[Vec<f64>]) -> (usize, f64) {
    let mut best = (0, f64::INFINITY);
    for (idx, centroid) in centroids.iter().enumerate() {
        let d = squared_distance(point, centroid);
        if d < best.1 {
            best = (idx, d);
        }
    }
    best
}

/// Flat k-means over `data[members]`
pub fn lloyd(
    data: &[Vec<f64>],
    members: &[usize],
    params: &KMeansParams,
    rng: &mut StdRng,
) -> KMeansResult {
    let dimension = data.first().map_or(0, Vec::len);
    let k = params.k.min(members.len()).max(1);

    let mut centroids = match params.init {
        CentersInit::Random => init_random(data, members, k, rng),
        CentersInit::Gonzales => init_gonzales(data, members, k, rng),
        CentersInit::KMeansPP => init_plus_plus(data, members, k, rng),
    };

    let limit = params.max_iterations.unwrap_or(CONVERGENCE_LIMIT);
    let mut assignments = vec![usize::MAX; members.len()];
    let mut converged = false;
    let mut iterations = 0;

    while iterations < limit {
        iterations += 1;

        let mut changed = false;
        for (slot, &m) in members.iter().enumerate() {
            let (nearest, _) = closest(&data[m], &centroids);
            if assignments[slot] != nearest {
                assignments[slot] = nearest;
                changed = true;
            }
        }

        if !changed {
            converged = true;
            break;
        }

        centroids = update_centroids(data, members, &assignments, k, dimension, rng);
    }

    // A capped run may stop right after an update; reassign to the final centroids
    if !converged {
        for (slot, &m) in members.iter().enumerate() {
            assignments[slot] = closest(&data[m], &centroids).0;
        }
    }

    let inertia = members
        .iter()
        .zip(&assignments)
        .map(|(&m, &c)| squared_distance(&data[m], &centroids[c]))
        .sum();

    KMeansResult {
        centroids,
        assignments,
        inertia,
        iterations,
        converged,
    }
}

/// Pick `k` distinct members uniformly
fn init_random(data: &[Vec<f64>], members: &[usize], k: usize, rng: &mut StdRng) -> Vec<Vec<f64>> {
    members
        .choose_multiple(rng, k)
        .map(|&m| data[m].clone())
        .collect()
}

/// Farthest-first traversal from a random start
fn init_gonzales(data: &[Vec<f64>], members: &[usize], k: usize, rng: &mut StdRng) -> Vec<Vec<f64>> {
    let mut centroids = Vec::with_capacity(k);
    let first = members[rng.gen_range(0..members.len())];
    centroids.push(data[first].clone());

    let mut nearest: Vec<f64> = members
        .iter()
        .map(|&m| squared_distance(&data[m], &centroids[0]))
        .collect();

    while centroids.len() < k {
        let (slot, _) = nearest
            .iter()
            .enumerate()
            .fold((0, f64::NEG_INFINITY), |best, (i, &d)| if d > best.1 { (i, d) } else { best });
        let chosen = data[members[slot]].clone();
        for (d, &m) in nearest.iter_mut().zip(members) {
            *d = d.min(squared_distance(&data[m], &chosen));
        }
        centroids.push(chosen);
    }
    centroids
}

/// k-means++: sample proportional to squared distance from chosen centres
fn init_plus_plus(data: &[Vec<f64>], members: &[usize], k: usize, rng: &mut StdRng) -> Vec<Vec<f64>> {
    let mut centroids = Vec::with_capacity(k);
    let first = members[rng.gen_range(0..members.len())];
    centroids.push(data[first].clone());

    let mut weights: Vec<f64> = members
        .iter()
        .map(|&m| squared_distance(&data[m], &centroids[0]))
        .collect();

    while centroids.len() < k {
        let total: f64 = weights.iter().sum();
        let slot = if total <= 0.0 {
            rng.gen_range(0..members.len())
        } else {
            let target = rng.gen::<f64>() * total;
            let mut cumulative = 0.0;
            weights
                .iter()
                .position(|&w| {
                    cumulative += w;
                    cumulative >= target
                })
                .unwrap_or(members.len() - 1)
        };

        let chosen = data[members[slot]].clone();
        for (w, &m) in weights.iter_mut().zip(members) {
            *w = w.min(squared_distance(&data[m], &chosen));
        }
        centroids.push(chosen);
    }
    centroids
}

fn update_centroids(
    data: &[Vec<f64>],
    members: &[usize],
    assignments: &[usize],
    k: usize,
    dimension: usize,
    rng: &mut StdRng,
) -> Vec<Vec<f64>> {
    let mut centroids = vec![vec![0.0; dimension]; k];
    let mut counts = vec![0usize; k];

    for (&m, &c) in members.iter().zip(assignments) {
        counts[c] += 1;
        for (acc, &v) in centroids[c].iter_mut().zip(&data[m]) {
            *acc += v;
        }
    }

    for (c, &count) in counts.iter().enumerate() {
        if count == 0 {
            // Empty cluster: reseed from a random member
            let m = members[rng.gen_range(0..members.len())];
            centroids[c] = data[m].clone();
        } else {
            let n = count as f64;
            centroids[c].iter_mut().for_each(|v| *v /= n);
        }
    }
    centroids
}

struct Leaf {
    members: Vec<usize>,
    center: Vec<f64>,
    cost: f64,
    splittable: bool,
}

impl Leaf {
    fn new(data: &[Vec<f64>], members: Vec<usize>, dimension: usize) -> Self {
        let center = mean_of(data, &members, dimension);
        let cost = members
            .iter()
            .map(|&m| squared_distance(&data[m], &center))
            .sum();
        Self {
            members,
            center,
            cost,
            splittable: true,
        }
    }
}

/// Grow a cluster tree to `clusters` leaves and return their centroids.
///
/// Returns fewer centroids when no remaining leaf can be split (too few
/// members, or all members identical).
pub fn hierarchical(
    data: &[Vec<f64>],
    clusters: usize,
    branching: usize,
    max_iterations: Option<usize>,
    init: CentersInit,
    rng: &mut StdRng,
) -> Vec<Vec<f64>> {
    if data.is_empty() || clusters == 0 {
        return Vec::new();
    }
    let dimension = data[0].len();
    let branching = branching.max(2);

    let mut leaves = vec![Leaf::new(data, (0..data.len()).collect(), dimension)];

    while leaves.len() < clusters {
        let children = branching.min(clusters - leaves.len() + 1);

        let candidate = leaves
            .iter()
            .enumerate()
            .filter(|(_, leaf)| leaf.splittable && leaf.members.len() >= children && leaf.cost > 0.0)
            .max_by(|a, b| a.1.cost.total_cmp(&b.1.cost))
            .map(|(idx, _)| idx);

        let Some(idx) = candidate else {
            log::debug!(
                "No splittable cluster left at {} of {} clusters",
                leaves.len(),
                clusters
            );
            break;
        };

        let mut leaf = leaves.swap_remove(idx);
        let params = KMeansParams {
            k: children,
            max_iterations,
            init,
        };
        let result = lloyd(data, &leaf.members, &params, rng);

        let mut groups = vec![Vec::new(); children];
        for (&m, &c) in leaf.members.iter().zip(&result.assignments) {
            groups[c].push(m);
        }
        groups.retain(|g| !g.is_empty());

        if groups.len() < 2 {
            leaf.splittable = false;
            leaves.push(leaf);
            continue;
        }

        leaves.extend(groups.into_iter().map(|g| Leaf::new(data, g, dimension)));
    }

    leaves.into_iter().map(|leaf| leaf.center).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn two_blobs() -> Vec<Vec<f64>> {
        vec![
            vec![0.0, 0.0], vec![0.1, 0.1], vec![0.0, 0.1],
            vec![5.0, 5.0], vec![5.1, 5.1], vec![5.0, 5.1],
        ]
    }

    #[test]
    fn test_lloyd_separates_blobs() {
        let data = two_blobs();
        let members: Vec<usize> = (0..data.len()).collect();
        let mut rng = StdRng::seed_from_u64(42);

        for init in [CentersInit::Random, CentersInit::Gonzales, CentersInit::KMeansPP] {
            let params = KMeansParams { k: 2, max_iterations: None, init };
            let result = lloyd(&data, &members, &params, &mut rng);

            assert_eq!(result.centroids.len(), 2);
            assert!(result.converged);
            assert_eq!(result.assignments[0], result.assignments[1]);
            assert_ne!(result.assignments[0], result.assignments[3]);
            assert!(result.inertia < 0.1);
        }
    }

    #[test]
    fn test_iteration_cap() {
        let data = two_blobs();
        let members: Vec<usize> = (0..data.len()).collect();
        let mut rng = StdRng::seed_from_u64(7);
        let params = KMeansParams { k: 2, max_iterations: Some(1), init: CentersInit::Random };
        let result = lloyd(&data, &members, &params, &mut rng);
        assert_eq!(result.iterations, 1);
    }

    #[test]
    fn test_hierarchical_count() {
        let mut rng = StdRng::seed_from_u64(1);
        let data: Vec<Vec<f64>> = (0..60)
            .map(|_| vec![rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0)])
            .collect();

        let centers = hierarchical(&data, 7, 4, None, CentersInit::Random, &mut rng);
        assert_eq!(centers.len(), 7);

        let centers = hierarchical(&data, 5, 3, Some(10), CentersInit::KMeansPP, &mut rng);
        assert_eq!(centers.len(), 5);
    }

    #[test]
    fn test_hierarchical_single_cluster_is_mean() {
        let data = two_blobs();
        let mut rng = StdRng::seed_from_u64(3);
        let centers = hierarchical(&data, 1, 2, None, CentersInit::Random, &mut rng);
        assert_eq!(centers.len(), 1);
        assert_relative_eq!(centers[0][0], 2.533333, epsilon = 1e-5);
    }

    #[test]
    fn test_hierarchical_stops_on_identical_points() {
        let data = vec![vec![1.0, 1.0]; 10];
        let mut rng = StdRng::seed_from_u64(5);
        let centers = hierarchical(&data, 4, 2, None, CentersInit::Random, &mut rng);
        assert_eq!(centers.len(), 1);
    }

    #[test]
    fn test_same_seed_same_centers() {
        let data = two_blobs();
        let a = hierarchical(&data, 3, 2, None, CentersInit::Random, &mut StdRng::seed_from_u64(9));
        let b = hierarchical(&data, 3, 2, None, CentersInit::Random, &mut StdRng::seed_from_u64(9));
        assert_eq!(a, b);
    }
}
