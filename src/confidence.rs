use ndarray::prelude::*;

use crate::error::{Result, RlError};

/// Plausible set of MDPs around the empirical estimates.
///
/// For every state-action pair it keeps the empirical mean reward and
/// next-state distribution together with L1/L-infinity radii shrinking as
/// `sqrt(ln(t)/n)`. Entries of illegal pairs are never written and never read.
pub struct ConfidenceRegion {
    pub r_hat: Array2<f64>,  // [S, A]
    pub beta_r: Array2<f64>, // [S, A]
    pub p_hat: Array3<f64>,  // [S, A, S]
    pub beta_p: Array2<f64>, // [S, A]
}

impl ConfidenceRegion {
    pub fn new(num_states: usize, num_actions: usize) -> Self {
        Self {
            r_hat: Array2::zeros((num_states, num_actions)),
            beta_r: Array2::zeros((num_states, num_actions)),
            p_hat: Array3::zeros((num_states, num_actions, num_states)),
            beta_p: Array2::zeros((num_states, num_actions)),
        }
    }

    pub fn num_states(&self) -> usize {
        self.p_hat.dim().0
    }

    pub fn num_actions(&self) -> usize {
        self.p_hat.dim().1
    }

    /// Refreshes estimates and radii from visit statistics at time `t` with
    /// confidence parameter `delta`.
    ///
    /// Unvisited pairs keep a uniform next-state estimate and the widest
    /// radii (`n` is floored at one).
    pub fn update(
        &mut self,
        legal: &[Vec<usize>],
        visits: &Array2<u64>,
        reward_sums: &Array2<f64>,
        transition_counts: &Array3<u64>,
        t: usize,
        delta: f64,
    ) -> Result<()> {
        if t == 0 {
            return Err(RlError::InvalidArgument(
                "confidence update needs t >= 1".into(),
            ));
        }
        if !(delta > 0.0 && delta < 1.0) {
            return Err(RlError::InvalidArgument(format!(
                "delta must lie in (0, 1), got {}",
                delta
            )));
        }

        let n_states = self.num_states();
        let n_actions = self.num_actions();
        let t_f = t as f64;
        let reward_log = (2.0 * n_states as f64 * n_actions as f64 * t_f / delta).ln();
        let transition_log = (2.0 * n_actions as f64 * t_f / delta).ln();

        for (x, actions) in legal.iter().enumerate() {
            for &a in actions {
                let n = visits[[x, a]].max(1) as f64;
                self.r_hat[[x, a]] = reward_sums[[x, a]] / n;
                self.beta_r[[x, a]] = (3.5 * reward_log / n).sqrt();
                self.beta_p[[x, a]] = (14.0 * transition_log / n).sqrt();

                let mut row = self.p_hat.slice_mut(s![x, a, ..]);
                if visits[[x, a]] > 0 {
                    for y in 0..n_states {
                        row[y] = transition_counts[[x, a, y]] as f64 / n;
                    }
                } else {
                    row.fill(1.0 / n_states as f64);
                }
            }
        }
        Ok(())
    }

    /// Most favorable plausible reward for `(x, a)`.
    pub fn optimist_reward(&self, x: usize, a: usize) -> f64 {
        self.r_hat[[x, a]] + self.beta_r[[x, a]]
    }
}
