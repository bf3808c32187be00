use ndarray::prelude::*;
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;
use rand::prelude::*;

use crate::error::{Result, RlError};
use crate::mdp::OfflineMdp;

pub const LEFT: usize = 0;
pub const RIGHT: usize = 1;

/// RiverSwim chain of `n` states. Swimming right makes progress with chance
/// `progress_chance`, is washed back with chance `flow_back_chance` and halts
/// otherwise; swimming left always succeeds. Loitering on the left bank pays
/// `lazy_reward`, reaching the far end pays `win_reward`.
pub fn river_swim(
    n: usize,
    progress_chance: f64,
    flow_back_chance: f64,
    lazy_reward: f64,
    win_reward: f64,
    seed: u64,
) -> Result<OfflineMdp> {
    if n < 2 {
        return Err(RlError::InvalidArgument(format!(
            "the river needs at least two states, got {}",
            n
        )));
    }
    let halt_chance = 1.0 - progress_chance - flow_back_chance;
    if halt_chance < 0.0 {
        return Err(RlError::InvalidArgument(format!(
            "progress chance {} and flow-back chance {} exceed one",
            progress_chance, flow_back_chance
        )));
    }

    let legal = vec![vec![LEFT, RIGHT]; n];
    let mut transitions = Array3::<f64>::zeros((n, 2, n));
    for x in 1..n - 1 {
        transitions[[x, RIGHT, x + 1]] = progress_chance;
        transitions[[x, RIGHT, x]] = halt_chance;
        transitions[[x, RIGHT, x - 1]] = flow_back_chance;
        transitions[[x, LEFT, x - 1]] = 1.0;
    }
    transitions[[0, RIGHT, 0]] = halt_chance;
    transitions[[0, RIGHT, 1]] = progress_chance + flow_back_chance;
    transitions[[0, LEFT, 0]] = 1.0;
    transitions[[n - 1, RIGHT, n - 1]] = progress_chance + halt_chance;
    transitions[[n - 1, RIGHT, n - 2]] = flow_back_chance;
    transitions[[n - 1, LEFT, n - 2]] = 1.0;

    let mut rewards = Array2::<f64>::zeros((n, 2));
    rewards[[0, LEFT]] = lazy_reward;
    rewards[[n - 1, RIGHT]] = win_reward;

    OfflineMdp::new(legal, transitions, rewards, 1.0, seed)
}

/// Ten-state playground with ragged action sets: from state `x` only the
/// actions `a` with `gcd(x + 1, a + 1) == 1` are legal, playing `a` moves to
/// `(x + a + 1) % 10` with chance 0.91 and anywhere else uniformly, and the
/// reward chance is `((x + a + 2) % 10) / 10`.
pub fn coprime_mdp(seed: u64) -> Result<OfflineMdp> {
    const N: usize = 10;

    let mut legal = Vec::with_capacity(N);
    for x in 0..N {
        let actions: Vec<usize> = (0..N).filter(|&a| gcd(x + 1, a + 1) == 1).collect();
        legal.push(actions);
    }

    let mut transitions = Array3::<f64>::from_elem((N, N, N), 0.01);
    let mut rewards = Array2::<f64>::zeros((N, N));
    for x in 0..N {
        for a in 0..N {
            transitions[[x, a, (x + a + 1) % N]] = 0.91;
            rewards[[x, a]] = ((x + a + 2) % N) as f64 / 10.0;
        }
    }

    OfflineMdp::new(legal, transitions, rewards, 1.0, seed)
}

fn gcd(mut a: usize, mut b: usize) -> usize {
    while b != 0 {
        let r = a % b;
        a = b;
        b = r;
    }
    a
}

/// Uniformly random MDP: every action legal everywhere, kernels drawn
/// uniformly and normalized row by row, Bernoulli reward means uniform on
/// `[0, 1]`. Useful as an unstructured planning target in tests and sweeps.
pub fn random_mdp(n: usize, num_actions: usize, seed: u64) -> Result<OfflineMdp> {
    let mut rng = StdRng::seed_from_u64(seed);
    let legal = vec![(0..num_actions).collect::<Vec<_>>(); n];

    let mut transitions =
        Array3::<f64>::random_using((n, num_actions, n), Uniform::new(0.0, 1.0), &mut rng);
    for x in 0..n {
        for action in 0..num_actions {
            let mut row = transitions.slice_mut(s![x, action, ..]);
            let sum = row.sum();
            row.mapv_inplace(|p| p / sum);
        }
    }
    let rewards = Array2::<f64>::random_using((n, num_actions), Uniform::new(0.0, 1.0), &mut rng);

    OfflineMdp::new(legal, transitions, rewards, 1.0, rng.gen())
}
