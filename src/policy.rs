use ndarray::prelude::*;
use rand::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{Result, RlError};
use crate::mdp::Sampler;

/// Deterministic policy with one or more layers, applied cyclically:
/// at time `t` state `x` plays `layers[[t % L, x]]`.
///
/// Legality of the stored actions is the caller's responsibility.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Policy {
    layers: Array2<usize>, // [L, S]
}

impl Policy {
    /// Single-layer policy playing `actions[x]` in state `x` at every time.
    pub fn stationary(actions: Vec<usize>) -> Result<Self> {
        if actions.is_empty() {
            return Err(RlError::InvalidArgument(
                "stationary policy needs at least one state".into(),
            ));
        }
        let n = actions.len();
        Ok(Self {
            layers: Array2::from_shape_vec((1, n), actions).unwrap(),
        })
    }

    /// Cyclic policy from an `[L, S]` layer matrix.
    pub fn cyclic(layers: Array2<usize>) -> Result<Self> {
        let (l, n) = layers.dim();
        if l == 0 || n == 0 {
            return Err(RlError::InvalidArgument(format!(
                "policy needs at least one layer and one state, got shape ({}, {})",
                l, n
            )));
        }
        Ok(Self { layers })
    }

    pub fn action(&self, state: usize, t: usize) -> usize {
        let l = self.layers.nrows();
        self.layers[[t % l, state]]
    }

    pub fn num_layers(&self) -> usize {
        self.layers.nrows()
    }

    pub fn num_states(&self) -> usize {
        self.layers.ncols()
    }

    pub fn layer(&self, l: usize) -> ArrayView1<'_, usize> {
        self.layers.row(l)
    }

    /// Prints the policy to stdout, one line per layer.
    pub fn show(&self) {
        let steps = self.num_layers();
        if steps > 1 {
            println!("Showing policy with {} steps:", steps);
        } else {
            println!("Showing stationary policy:");
        }
        for (t, layer) in self.layers.rows().into_iter().enumerate() {
            print!("({}/{}) ", t + 1, steps);
            for &action in layer {
                print!(" {}", action);
            }
            println!();
        }
    }
}

/// An MDP paired with a policy to follow.
///
/// The agent records nothing; rewards and time live in the MDP. Its private
/// generator is used only to pick random actions, so policy runs stay
/// reproducible for a fixed MDP seed.
pub struct Agent<'a, M: Sampler> {
    mdp: &'a mut M,
    policy: Policy,
    rng: StdRng,
}

impl<'a, M: Sampler> Agent<'a, M> {
    pub fn new(mdp: &'a mut M, policy: Policy, seed: u64) -> Self {
        Self {
            mdp,
            policy,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn mdp(&self) -> &M {
        self.mdp
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    /// Plays one step of the policy. Returns the action and its reward.
    pub fn step_policy(&mut self) -> Result<(usize, f64)> {
        let state = self.mdp.state();
        let t = self.mdp.time();
        let action = self.policy.action(state, t);
        let reward = self.mdp.step(action)?;
        Ok((action, reward))
    }

    /// Plays a uniformly random legal action from the current state.
    pub fn step_random(&mut self) -> Result<(usize, f64)> {
        let state = self.mdp.state();
        let action = *self
            .mdp
            .legal_actions(state)
            .choose(&mut self.rng)
            .expect("legal action set is never empty");
        let reward = self.mdp.step(action)?;
        Ok((action, reward))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stationary_policy_ignores_time() {
        let policy = Policy::stationary(vec![2, 0, 1]).unwrap();
        assert_eq!(policy.num_layers(), 1);
        for t in 0..5 {
            assert_eq!(policy.action(0, t), 2);
            assert_eq!(policy.action(2, t), 1);
        }
    }

    #[test]
    fn cyclic_policy_wraps_layers() {
        let layers = Array2::from_shape_vec((2, 2), vec![0, 0, 1, 1]).unwrap();
        let policy = Policy::cyclic(layers).unwrap();
        assert_eq!(policy.action(0, 0), 0);
        assert_eq!(policy.action(0, 1), 1);
        assert_eq!(policy.action(0, 2), 0);
        assert_eq!(policy.action(1, 7), 1);
    }

    #[test]
    fn empty_policies_are_rejected() {
        assert!(Policy::stationary(Vec::new()).is_err());
        assert!(Policy::cyclic(Array2::zeros((0, 3))).is_err());
    }

    #[test]
    fn agent_follows_its_policy() {
        let mut mdp = crate::benchmarks::river_swim(3, 0.35, 0.05, 0.1, 0.9, 11).unwrap();
        let all_left = Policy::stationary(vec![0, 0, 0]).unwrap();
        let mut agent = Agent::new(&mut mdp, all_left, 0);
        for _ in 0..10 {
            let (action, _) = agent.step_policy().unwrap();
            assert_eq!(action, 0);
        }
        // Always swimming left pins the agent to the bank.
        assert_eq!(agent.mdp().state(), 0);
    }

    #[test]
    fn agent_cycles_through_policy_layers() {
        let mut mdp = crate::benchmarks::river_swim(3, 0.35, 0.05, 0.1, 0.9, 17).unwrap();
        // Layer 0 swims right, layer 1 swims left; the MDP clock picks the
        // layer, so actions alternate from the very first step.
        let layers = Array2::from_shape_vec((2, 3), vec![1, 1, 1, 0, 0, 0]).unwrap();
        let cyclic = Policy::cyclic(layers).unwrap();
        let mut agent = Agent::new(&mut mdp, cyclic, 0);
        for i in 0..12 {
            let (action, _) = agent.step_policy().unwrap();
            assert_eq!(action, if i % 2 == 0 { 1 } else { 0 });
        }
    }

    #[test]
    fn random_agent_only_plays_legal_actions() {
        let mut mdp = crate::benchmarks::river_swim(3, 0.35, 0.05, 0.1, 0.9, 11).unwrap();
        let policy = Policy::stationary(vec![0, 0, 0]).unwrap();
        let mut agent = Agent::new(&mut mdp, policy, 3);
        for _ in 0..50 {
            let (action, _) = agent.step_random().unwrap();
            assert!(action < 2);
        }
    }
}
