use ndarray::prelude::*;
use rayon::prelude::*;

use crate::confidence::ConfidenceRegion;
use crate::error::{Result, RlError};
use crate::evi::extended_value_iteration;
use crate::mdp::{Mdp, Planner, Sampler};
use crate::policy::{Agent, Policy};
use crate::ucrl::{EpisodeRecord, Event, StepStats, EVI_STEP_CAP};
use crate::value_iteration::value_iteration;

const MEASURE_STEP_CAP: usize = 1_000_000;
const MEASURE_TOLERANCE: f64 = 1e-6;

/// Markov chain induced by a stationary policy on a base MDP, rewarded one
/// unit only when the target state plays its policy action. The gain of this
/// chain is the invariant-measure weight of the target state.
struct RedirectedChain<'a, M: Planner> {
    base: &'a M,
    restricted: &'a [Vec<usize>],
    target: usize,
    target_action: usize,
}

impl<M: Planner> Mdp for RedirectedChain<'_, M> {
    fn num_states(&self) -> usize {
        self.base.num_states()
    }

    fn num_actions(&self) -> usize {
        self.base.num_actions()
    }

    fn legal_actions(&self, x: usize) -> &[usize] {
        &self.restricted[x]
    }
}

impl<M: Planner> Planner for RedirectedChain<'_, M> {
    fn reward(&self, x: usize, a: usize) -> f64 {
        if x == self.target && a == self.target_action {
            1.0
        } else {
            0.0
        }
    }

    fn transition(&self, x: usize, a: usize, y: usize) -> f64 {
        self.base.transition(x, a, y)
    }
}

/// View of a base MDP with the legal set of every state pinned to a single
/// policy action, leaving rewards and transitions untouched.
struct PinnedPolicy<'a, M: Planner> {
    base: &'a M,
    restricted: &'a [Vec<usize>],
}

impl<M: Planner> Mdp for PinnedPolicy<'_, M> {
    fn num_states(&self) -> usize {
        self.base.num_states()
    }

    fn num_actions(&self) -> usize {
        self.base.num_actions()
    }

    fn legal_actions(&self, x: usize) -> &[usize] {
        &self.restricted[x]
    }
}

impl<M: Planner> Planner for PinnedPolicy<'_, M> {
    fn reward(&self, x: usize, a: usize) -> f64 {
        self.base.reward(x, a)
    }

    fn transition(&self, x: usize, a: usize, y: usize) -> f64 {
        self.base.transition(x, a, y)
    }
}

/// Gain and bias of a fixed stationary policy: the Bellman sweep runs with
/// the policy's action pinned in every state, so the "greedy" iteration is
/// plain policy evaluation.
pub fn evaluate_policy<M: Planner>(
    mdp: &M,
    policy: &Policy,
    max_steps: usize,
    eps: f64,
) -> Result<crate::value_iteration::Solution> {
    let n = mdp.num_states();
    let restricted: Vec<Vec<usize>> = (0..n).map(|x| vec![policy.action(x, 0)]).collect();
    let pinned = PinnedPolicy {
        base: mdp,
        restricted: &restricted,
    };
    value_iteration(&pinned, max_steps, eps)
}

/// Invariant measure of the chain induced by `policy`, state by state, via
/// the reward-redirection trick: value iteration on a copy of the chain that
/// pays only at the probed state returns its visit frequency as the gain.
pub fn invariant_measure<M: Planner + Sync>(mdp: &M, policy: &Policy) -> Result<Array1<f64>> {
    let n = mdp.num_states();
    let restricted: Vec<Vec<usize>> = (0..n).map(|x| vec![policy.action(x, 0)]).collect();

    let weights = (0..n)
        .into_par_iter()
        .map(|target| {
            let chain = RedirectedChain {
                base: mdp,
                restricted: &restricted,
                target,
                target_action: policy.action(target, 0),
            };
            value_iteration(&chain, MEASURE_STEP_CAP, MEASURE_TOLERANCE)
                .map(|solution| solution.gain)
        })
        .collect::<Result<Vec<f64>>>()?;

    Ok(Array1::from_vec(weights))
}

/// Empirical invariant measure: plays the agent's policy for `steps` steps
/// from the MDP's current state and returns post-step visit frequencies.
pub fn invariant_measure_estimate<M: Sampler>(
    agent: &mut Agent<'_, M>,
    steps: usize,
) -> Result<Array1<f64>> {
    if steps == 0 {
        return Err(RlError::InvalidArgument(
            "the estimate needs at least one step".into(),
        ));
    }

    let n = agent.mdp().num_states();
    let mut frequency = Array1::<f64>::zeros(n);
    for _ in 0..steps {
        agent.step_policy()?;
        frequency[agent.mdp().state()] += 1.0;
    }
    Ok(frequency / steps as f64)
}

/// Bellman-gap decomposition of regret.
///
/// `gaps[[x, a]] = (g - R(x,a)) + (h[x] - sum_y p(y|x,a) h[y])` for legal
/// pairs, zero elsewhere. The gap of an optimal action vanishes; summing
/// visit counts weighted by gaps attributes cumulative regret to individual
/// suboptimal pairs.
pub fn bellman_gaps<M: Planner>(mdp: &M, gain: f64, bias: &Array1<f64>) -> Array2<f64> {
    let n = mdp.num_states();
    let num_actions = mdp.num_actions();
    let mut gaps = Array2::<f64>::zeros((n, num_actions));
    for x in 0..n {
        for &a in mdp.legal_actions(x) {
            let mut expected = 0.0;
            for y in 0..n {
                expected += mdp.transition(x, a, y) * bias[y];
            }
            gaps[[x, a]] = (gain - mdp.reward(x, a)) + (bias[x] - expected);
        }
    }
    gaps
}

/// Replays a recorded episode and compares the optimistic gain of the full
/// action set against the gain attainable under the episode's policy.
///
/// Statistics and the confidence region are rebuilt event by event; after
/// each prefix of length `t` extended value iteration runs once unrestricted
/// and once on the policy's actions only, both at tolerance `1/sqrt(t)`.
/// Returns the two gain series `(optimist, policy)`; how fast they diverge
/// shows when the episode's policy stopped being defensible.
pub fn performance_comparison(
    history: &[Event],
    policy: &Policy,
    legal: &[Vec<usize>],
    num_actions: usize,
    delta: f64,
) -> Result<(Vec<f64>, Vec<f64>)> {
    let n = legal.len();
    if n == 0 {
        return Err(RlError::InvalidArgument(
            "replay needs at least one state".into(),
        ));
    }

    let restricted: Vec<Vec<usize>> = (0..n).map(|x| vec![policy.action(x, 0)]).collect();
    let mut stats = StepStats::zeros(n, num_actions);
    let mut region = ConfidenceRegion::new(n, num_actions);

    let mut optimist = Vec::with_capacity(history.len());
    let mut frozen = Vec::with_capacity(history.len());
    for (i, event) in history.iter().enumerate() {
        stats.record(event);
        let t = i + 1;
        region.update(
            legal,
            &stats.visits,
            &stats.reward_sums,
            &stats.transition_counts,
            t,
            delta,
        )?;
        let tolerance = 1.0 / (t as f64).sqrt();
        let full = extended_value_iteration(&region, legal, EVI_STEP_CAP, tolerance)?;
        let pinned = extended_value_iteration(&region, &restricted, EVI_STEP_CAP, tolerance)?;
        optimist.push(full.gain);
        frozen.push(pinned.gain);
    }
    Ok((optimist, frozen))
}

/// Regret attributed to a trace by the gap decomposition: every event
/// charges the Bellman gap of its state-action pair. Up to martingale noise
/// and a bias-span boundary term this matches the cumulative regret of the
/// trace against the gain used to compute `gaps`.
pub fn attribute_regret(history: &[Event], gaps: &Array2<f64>) -> f64 {
    history
        .iter()
        .map(|event| gaps[[event.state, event.action]])
        .sum()
}

/// Start time of the first recorded episode at or after `min_start` whose
/// policy differs from `reference`, or 0 when every such episode agrees.
pub fn find_bad_episode(
    episodes: &[EpisodeRecord],
    reference: &Policy,
    min_start: usize,
) -> usize {
    for record in episodes {
        if record.start_time >= min_start && record.policy != *reference {
            return record.start_time;
        }
    }
    0
}
