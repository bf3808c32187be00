use ndarray::prelude::*;

use crate::error::{Result, RlError};
use crate::mdp::Planner;
use crate::policy::Policy;

/// Output of value iteration: a stationary policy, its gain estimate and the
/// normalized bias vector (`bias[0] == 0`).
///
/// `converged` is false when the iteration budget ran out before the span of
/// the Bellman residuals fell below the tolerance. The policy, gain and bias
/// are then the best effort from the last sweep, never uninitialized data.
pub struct Solution {
    pub policy: Policy,
    pub gain: f64,
    pub bias: Array1<f64>,
    pub converged: bool,
}

/// Average-reward value iteration with span-based termination.
///
/// Runs Bellman sweeps until `max(w - v) - min(w - v) < eps` or `max_steps`
/// sweeps are spent. The bias is re-anchored at state 0 after every sweep and
/// the gain is the midpoint of the final residual range.
pub fn value_iteration<M: Planner>(mdp: &M, max_steps: usize, eps: f64) -> Result<Solution> {
    if eps <= 0.0 {
        return Err(RlError::InvalidArgument(
            "eps must be a positive value".into(),
        ));
    }

    let n = mdp.num_states();
    let mut v = Array1::<f64>::zeros(n);
    let mut w = Array1::<f64>::zeros(n);
    let mut best_action = vec![0usize; n];
    let mut gain = 0.0;
    let mut converged = false;

    for _ in 0..max_steps {
        // One Bellman sweep: w[x] = max_a R(x,a) + sum_y p(y|x,a) v[y].
        // Ties keep the first legal action (strict improvement only).
        for x in 0..n {
            let mut max_q = f64::NEG_INFINITY;
            for &a in mdp.legal_actions(x) {
                let mut q = mdp.reward(x, a);
                for y in 0..n {
                    q += mdp.transition(x, a, y) * v[y];
                }
                if q > max_q {
                    max_q = q;
                    best_action[x] = a;
                }
            }
            w[x] = max_q;
        }

        let mut max_dv = f64::NEG_INFINITY;
        let mut min_dv = f64::INFINITY;
        for x in 0..n {
            let dv = w[x] - v[x];
            if dv > max_dv {
                max_dv = dv;
            }
            if dv < min_dv {
                min_dv = dv;
            }
            v[x] = w[x];
        }

        // Normalize the bias so state 0 stays the reference point.
        let v0 = v[0];
        for x in 0..n {
            v[x] -= v0;
        }

        gain = (max_dv + min_dv) / 2.0;
        if max_dv - min_dv < eps {
            converged = true;
            break;
        }
    }

    Ok(Solution {
        policy: Policy::stationary(best_action)?,
        gain,
        bias: v,
        converged,
    })
}
