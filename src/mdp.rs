use ndarray::prelude::*;
use rand::distributions::{Distribution, WeightedIndex};
use rand::prelude::*;

use crate::error::{Result, RlError};

/// Dimensions and action legality, shared by every view of an MDP.
pub trait Mdp {
    fn num_states(&self) -> usize;
    fn num_actions(&self) -> usize;
    fn legal_actions(&self, x: usize) -> &[usize];
}

/// Sampling access to an MDP: what a learning agent is allowed to see.
pub trait Sampler: Mdp {
    fn state(&self) -> usize;
    fn time(&self) -> usize;
    fn total_reward(&self) -> f64;
    fn discount(&self) -> f64;
    /// Plays `action` from the current state and returns the sampled reward.
    fn step(&mut self, action: usize) -> Result<f64>;
}

/// Planning access to an MDP: the kernel and reward tables are readable.
pub trait Planner: Mdp {
    fn reward(&self, x: usize, a: usize) -> f64;
    fn transition(&self, x: usize, a: usize, y: usize) -> f64;
}

/// Tabular MDP with Bernoulli rewards and hidden tables.
///
/// Exposes only [`Sampler`]: a learner interacting with a `TabularMdp` has to
/// estimate transitions and rewards from experience. The `discount` field
/// scales *sampled* rewards (step `t` pays `discount^(t-1)` on a success);
/// the average-reward planners never read it.
#[derive(Debug)]
pub struct TabularMdp {
    legal: Vec<Vec<usize>>,
    transitions: Array3<f64>, // [S, A, S]
    rewards: Array2<f64>,     // [S, A]
    discount: f64,
    state: usize,
    t: usize,
    max_reward: f64,
    total_reward: f64,
    rng: StdRng,
}

const KERNEL_ROW_TOLERANCE: f64 = 1e-6;

impl TabularMdp {
    /// Builds an MDP from dense tensors. The action-space width is declared by
    /// the tensor shapes: every state shares the same `A` even when its legal
    /// set is smaller.
    pub fn new(
        legal: Vec<Vec<usize>>,
        transitions: Array3<f64>,
        rewards: Array2<f64>,
        discount: f64,
        seed: u64,
    ) -> Result<Self> {
        let (n, a, n2) = transitions.dim();
        if n == 0 || a == 0 {
            return Err(RlError::InvalidArgument(
                "MDP needs at least one state and one action".into(),
            ));
        }
        if n2 != n {
            return Err(RlError::InvalidArgument(format!(
                "transition tensor has shape ({}, {}, {})",
                n, a, n2
            )));
        }
        if rewards.dim() != (n, a) {
            return Err(RlError::InvalidArgument(format!(
                "reward table has shape {:?}, expected ({}, {})",
                rewards.dim(),
                n,
                a
            )));
        }
        if legal.len() != n {
            return Err(RlError::InvalidArgument(format!(
                "legal-action table covers {} states, expected {}",
                legal.len(),
                n
            )));
        }
        if !(discount > 0.0 && discount <= 1.0) {
            return Err(RlError::InvalidArgument(format!(
                "discount must lie in (0, 1], got {}",
                discount
            )));
        }
        for (x, actions) in legal.iter().enumerate() {
            if actions.is_empty() {
                return Err(RlError::InvalidArgument(format!(
                    "state {} has no legal action",
                    x
                )));
            }
            for &action in actions {
                if action >= a {
                    return Err(RlError::InvalidArgument(format!(
                        "state {} declares legal action {} beyond width {}",
                        x, action, a
                    )));
                }
                let chance = rewards[[x, action]];
                if !(0.0..=1.0).contains(&chance) {
                    return Err(RlError::InvalidArgument(format!(
                        "reward chance {} at ({}, {}) is not a probability",
                        chance, x, action
                    )));
                }
                let mut sum = 0.0;
                for y in 0..n {
                    let p = transitions[[x, action, y]];
                    if !(0.0..=1.0).contains(&p) {
                        return Err(RlError::InvalidArgument(format!(
                            "transition chance {} at ({}, {}, {}) is not a probability",
                            p, x, action, y
                        )));
                    }
                    sum += p;
                }
                if (sum - 1.0).abs() > KERNEL_ROW_TOLERANCE {
                    return Err(RlError::InvalidArgument(format!(
                        "transition row ({}, {}) sums to {}",
                        x, action, sum
                    )));
                }
            }
        }

        Ok(Self {
            legal,
            transitions,
            rewards,
            discount,
            state: 0,
            t: 0,
            max_reward: 1.0,
            total_reward: 0.0,
            rng: StdRng::seed_from_u64(seed),
        })
    }
}

impl Mdp for TabularMdp {
    fn num_states(&self) -> usize {
        self.transitions.dim().0
    }

    fn num_actions(&self) -> usize {
        self.transitions.dim().1
    }

    fn legal_actions(&self, x: usize) -> &[usize] {
        &self.legal[x]
    }
}

impl Sampler for TabularMdp {
    fn state(&self) -> usize {
        self.state
    }

    fn time(&self) -> usize {
        self.t
    }

    fn total_reward(&self) -> f64 {
        self.total_reward
    }

    fn discount(&self) -> f64 {
        self.discount
    }

    fn step(&mut self, action: usize) -> Result<f64> {
        if !self.legal[self.state].contains(&action) {
            return Err(RlError::IllegalAction {
                state: self.state,
                action,
            });
        }

        self.t += 1;

        // Transition draw first, reward draw second, from the single stream.
        let chances = self.transitions.slice(s![self.state, action, ..]).to_vec();
        let next_state = WeightedIndex::new(&chances).unwrap().sample(&mut self.rng);

        let chance = self.rewards[[self.state, action]];
        let reward = if self.rng.gen::<f64>() <= chance {
            self.max_reward
        } else {
            0.0
        };

        self.total_reward += reward;
        self.max_reward *= self.discount;
        self.state = next_state;
        Ok(reward)
    }
}

/// Tabular MDP with public tables, for planning.
pub struct OfflineMdp {
    inner: TabularMdp,
}

impl OfflineMdp {
    pub fn new(
        legal: Vec<Vec<usize>>,
        transitions: Array3<f64>,
        rewards: Array2<f64>,
        discount: f64,
        seed: u64,
    ) -> Result<Self> {
        Ok(Self {
            inner: TabularMdp::new(legal, transitions, rewards, discount, seed)?,
        })
    }

    /// Chance of reward for a state-action pair, with bounds checking.
    pub fn reward_chance(&self, x: usize, action: usize) -> Result<f64> {
        let (n, a, _) = self.inner.transitions.dim();
        if x >= n || action >= a {
            return Err(RlError::InvalidArgument(format!(
                "reward query ({}, {}) out of range for {} states and {} actions",
                x, action, n, a
            )));
        }
        Ok(self.inner.rewards[[x, action]])
    }

    /// Chance of moving from `x` to `y` with `action` (p(y|x,a)), with bounds
    /// checking.
    pub fn transition_chance(&self, x: usize, action: usize, y: usize) -> Result<f64> {
        let (n, a, _) = self.inner.transitions.dim();
        if x >= n || y >= n || action >= a {
            return Err(RlError::InvalidArgument(format!(
                "transition query ({}, {}, {}) out of range for {} states and {} actions",
                x, action, y, n, a
            )));
        }
        Ok(self.inner.transitions[[x, action, y]])
    }

    pub fn transition_kernel(&self) -> &Array3<f64> {
        &self.inner.transitions
    }

    pub fn reward_matrix(&self) -> &Array2<f64> {
        &self.inner.rewards
    }

    /// Prints every table of the MDP to stdout.
    pub fn show(&self) {
        let n = self.num_states();
        let a = self.num_actions();
        println!("Showing MDP with {} states and {} actions\n", n, a);

        println!("Actions:");
        for x in 0..n {
            print!("- {}: ", x);
            for &action in self.legal_actions(x) {
                print!("{} ", action);
            }
            println!();
        }
        println!();

        println!("Transitions:");
        for action in 0..a {
            println!("   [Showing transition matrix for action {}]", action);
            for x in 0..n {
                for y in 0..n {
                    print!("{:8.4} ", self.inner.transitions[[x, action, y]]);
                }
                println!();
            }
            println!();
        }

        println!("Rewards:");
        for x in 0..n {
            print!("  For state {}: ", x);
            for action in 0..a {
                print!("{:8.4} ", self.inner.rewards[[x, action]]);
            }
            println!();
        }
        println!();
    }
}

impl Mdp for OfflineMdp {
    fn num_states(&self) -> usize {
        self.inner.num_states()
    }

    fn num_actions(&self) -> usize {
        self.inner.num_actions()
    }

    fn legal_actions(&self, x: usize) -> &[usize] {
        self.inner.legal_actions(x)
    }
}

impl Sampler for OfflineMdp {
    fn state(&self) -> usize {
        self.inner.state()
    }

    fn time(&self) -> usize {
        self.inner.time()
    }

    fn total_reward(&self) -> f64 {
        self.inner.total_reward()
    }

    fn discount(&self) -> f64 {
        self.inner.discount()
    }

    fn step(&mut self, action: usize) -> Result<f64> {
        self.inner.step(action)
    }
}

impl Planner for OfflineMdp {
    fn reward(&self, x: usize, a: usize) -> f64 {
        self.inner.rewards[[x, a]]
    }

    fn transition(&self, x: usize, a: usize, y: usize) -> f64 {
        self.inner.transitions[[x, a, y]]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RlError;

    fn toggle_tensors() -> (Vec<Vec<usize>>, Array3<f64>, Array2<f64>) {
        let legal = vec![vec![0], vec![0]];
        let mut transitions = Array3::<f64>::zeros((2, 1, 2));
        transitions[[0, 0, 1]] = 1.0;
        transitions[[1, 0, 0]] = 1.0;
        let mut rewards = Array2::<f64>::zeros((2, 1));
        rewards[[1, 0]] = 1.0;
        (legal, transitions, rewards)
    }

    #[test]
    fn rejects_unnormalized_kernel() {
        let (legal, mut transitions, rewards) = toggle_tensors();
        transitions[[0, 0, 1]] = 0.7;
        let err = TabularMdp::new(legal, transitions, rewards, 1.0, 0).unwrap_err();
        assert!(matches!(err, RlError::InvalidArgument(_)));
    }

    #[test]
    fn rejects_state_without_actions() {
        let (mut legal, transitions, rewards) = toggle_tensors();
        legal[1].clear();
        let err = TabularMdp::new(legal, transitions, rewards, 1.0, 0).unwrap_err();
        assert!(matches!(err, RlError::InvalidArgument(_)));
    }

    #[test]
    fn rejects_action_beyond_declared_width() {
        let (mut legal, transitions, rewards) = toggle_tensors();
        legal[0].push(1);
        let err = TabularMdp::new(legal, transitions, rewards, 1.0, 0).unwrap_err();
        assert!(matches!(err, RlError::InvalidArgument(_)));
    }

    #[test]
    fn illegal_step_is_reported() {
        let (legal, transitions, rewards) = toggle_tensors();
        let mut mdp = TabularMdp::new(legal, transitions, rewards, 1.0, 0).unwrap();
        let err = mdp.step(5).unwrap_err();
        assert!(matches!(
            err,
            RlError::IllegalAction { state: 0, action: 5 }
        ));
        assert_eq!(mdp.time(), 0);
    }

    #[test]
    fn toggle_alternates_deterministically() {
        let (legal, transitions, rewards) = toggle_tensors();
        let mut mdp = TabularMdp::new(legal, transitions, rewards, 1.0, 7).unwrap();
        assert_eq!(mdp.state(), 0);
        mdp.step(0).unwrap();
        assert_eq!(mdp.state(), 1);
        let reward = mdp.step(0).unwrap();
        // State 1 pays with chance one.
        assert_eq!(reward, 1.0);
        assert_eq!(mdp.state(), 0);
        assert_eq!(mdp.time(), 2);
        assert_eq!(mdp.total_reward(), 1.0);
    }

    #[test]
    fn discount_scales_sampled_rewards_geometrically() {
        let legal = vec![vec![0]];
        let mut transitions = Array3::<f64>::zeros((1, 1, 1));
        transitions[[0, 0, 0]] = 1.0;
        let mut rewards = Array2::<f64>::zeros((1, 1));
        rewards[[0, 0]] = 1.0;
        let mut mdp = TabularMdp::new(legal, transitions, rewards, 0.5, 1).unwrap();
        assert_eq!(mdp.step(0).unwrap(), 1.0);
        assert_eq!(mdp.step(0).unwrap(), 0.5);
        assert_eq!(mdp.step(0).unwrap(), 0.25);
        assert_eq!(mdp.total_reward(), 1.75);
    }

    #[test]
    fn same_seed_reproduces_the_event_stream() {
        let run = |seed: u64| -> Vec<(usize, f64)> {
            let mut mdp = crate::benchmarks::river_swim(4, 0.35, 0.05, 0.1, 0.9, seed).unwrap();
            let mut trace = Vec::new();
            for i in 0..200 {
                let action = if i % 3 == 0 { 0 } else { 1 };
                let reward = mdp.step(action).unwrap();
                trace.push((mdp.state(), reward));
            }
            trace
        };
        assert_eq!(run(99), run(99));
        assert_ne!(run(99), run(100));
    }

    #[test]
    fn checked_queries_reject_out_of_range_indices() {
        let mdp = crate::benchmarks::river_swim(3, 0.35, 0.05, 0.1, 0.9, 0).unwrap();
        assert!(mdp.transition_chance(0, 1, 2).is_ok());
        assert!(mdp.transition_chance(3, 0, 0).is_err());
        assert!(mdp.transition_chance(0, 2, 0).is_err());
        assert!(mdp.reward_chance(0, 5).is_err());
    }
}
