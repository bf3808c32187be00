use ndarray::prelude::*;

/// Best plausible next-state distribution within L1 distance `slack` of `p`.
///
/// Solves `max <q, u>` over `||q - p||_1 <= slack`, `sum(q) = 1`,
/// `0 <= q[i] <= 1` with the greedy exchange: walk the states in decreasing
/// utility, move mass from the worst states onto the best ones until the
/// slack, an upper cap or a lower cap binds. The sort is stable, so utility
/// ties are broken by state index and the result is deterministic.
///
/// Every entry is rounded to five decimals before returning. The rounding
/// keeps repeated optimistic sweeps from drifting below the span test, so
/// extended value iteration terminates on the same iterate everywhere.
pub fn optimistic_transfer(p: ArrayView1<f64>, u: ArrayView1<f64>, slack: f64) -> Array1<f64> {
    let n = p.len();
    let mut q = p.to_owned();
    if n == 0 {
        return q;
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&i, &j| u[j].partial_cmp(&u[i]).unwrap());

    let mut slack = slack.max(0.0);
    let mut i = 0;
    let mut j = n - 1;
    while i < j && slack > 0.0 {
        let half = slack / 2.0;
        let room = 1.0 - q[order[i]]; // how much the best state can still take
        let mass = q[order[j]]; // how much the worst state can still give
        let moved = half.min(room).min(mass);

        q[order[i]] += moved;
        q[order[j]] -= moved;
        slack -= 2.0 * moved;

        if moved == half {
            break;
        }
        if moved == room {
            i += 1;
        }
        if moved == mass {
            j -= 1;
        }
    }

    q.mapv_inplace(|v| (v * 1e5).round() / 1e5);
    q
}

/// Value of the inner maximization, `<q, u>` for the optimal `q`.
pub fn inner_maximum(p: ArrayView1<f64>, u: ArrayView1<f64>, slack: f64) -> f64 {
    optimistic_transfer(p, u, slack).dot(&u)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn l1_distance(a: &Array1<f64>, b: ArrayView1<f64>) -> f64 {
        a.iter().zip(b.iter()).map(|(x, y)| (x - y).abs()).sum()
    }

    #[test]
    fn shifts_mass_toward_high_utility() {
        let p = array![0.5, 0.5];
        let u = array![1.0, 0.0];
        let q = optimistic_transfer(p.view(), u.view(), 0.4);
        assert_eq!(q, array![0.7, 0.3]);
        let value = inner_maximum(p.view(), u.view(), 0.4);
        assert!((value - 0.7).abs() < 1e-9);
    }

    #[test]
    fn zero_slack_returns_the_base_value() {
        let p = array![0.3, 0.2, 0.5];
        let u = array![2.0, -1.0, 1.0];
        let value = inner_maximum(p.view(), u.view(), 0.0);
        assert!((value - p.dot(&u)).abs() < 1e-9);
    }

    #[test]
    fn large_slack_concentrates_on_the_best_state() {
        let p = array![0.25, 0.25, 0.25, 0.25];
        let u = array![0.0, 3.0, 1.0, 2.0];
        let q = optimistic_transfer(p.view(), u.view(), 2.0);
        assert_eq!(q, array![0.0, 1.0, 0.0, 0.0]);
    }

    #[test]
    fn output_stays_a_distribution_within_slack() {
        let p = array![0.1, 0.4, 0.2, 0.3];
        let u = array![0.5, 2.0, 0.0, 1.0];
        for &slack in &[0.0, 0.1, 0.35, 0.8, 1.5] {
            let q = optimistic_transfer(p.view(), u.view(), slack);
            assert!(l1_distance(&q, p.view()) <= slack + 5e-5);
            assert!((q.sum() - 1.0).abs() <= 1e-4);
            for &v in &q {
                assert!((0.0..=1.0).contains(&v));
            }
        }
    }

    #[test]
    fn value_is_monotone_in_slack() {
        let p = array![0.2, 0.5, 0.3];
        let u = array![1.0, 0.2, 0.7];
        let mut previous = f64::NEG_INFINITY;
        for k in 0..=20 {
            let slack = 0.1 * k as f64;
            let value = inner_maximum(p.view(), u.view(), slack);
            assert!(value >= previous - 1e-9);
            previous = value;
        }
    }

    #[test]
    fn utility_ties_leave_the_base_distribution_alone() {
        let p = array![0.4, 0.35, 0.25];
        let u = array![1.0, 1.0, 1.0];
        let q = optimistic_transfer(p.view(), u.view(), 0.5);
        // Mass moves between tied states without changing the value; the
        // stable order transfers from the last index to the first.
        assert!((q.dot(&u) - 1.0).abs() < 1e-9);
        assert!((q.sum() - 1.0).abs() <= 1e-4);
    }

    #[test]
    fn greedy_beats_every_feasible_grid_point() {
        // Exhaustive check on three states: no distribution within the L1
        // ball may score better than the greedy exchange.
        let p = array![0.5, 0.3, 0.2];
        let u = array![0.4, 1.0, -0.2];
        for &slack in &[0.1, 0.3, 0.6, 1.2] {
            let greedy = inner_maximum(p.view(), u.view(), slack);
            let mut best = f64::NEG_INFINITY;
            let resolution = 100;
            for i in 0..=resolution {
                for j in 0..=(resolution - i) {
                    let q = [
                        i as f64 / resolution as f64,
                        j as f64 / resolution as f64,
                        (resolution - i - j) as f64 / resolution as f64,
                    ];
                    let distance: f64 =
                        q.iter().zip(p.iter()).map(|(a, b)| (a - b).abs()).sum();
                    if distance <= slack {
                        let value = q.iter().zip(u.iter()).map(|(a, b)| a * b).sum();
                        if value > best {
                            best = value;
                        }
                    }
                }
            }
            assert!(greedy >= best - 1e-4, "slack {}: {} < {}", slack, greedy, best);
        }
    }

    #[test]
    fn slack_beyond_total_mass_is_capped() {
        let p = array![1.0, 0.0];
        let u = array![0.0, 1.0];
        let q = optimistic_transfer(p.view(), u.view(), 10.0);
        assert_eq!(q, array![0.0, 1.0]);
    }
}
