use ndarray::prelude::*;
use serde::{Deserialize, Serialize};

use crate::confidence::ConfidenceRegion;
use crate::error::{Result, RlError};
use crate::evi::extended_value_iteration;
use crate::mdp::Sampler;
use crate::policy::Policy;
use crate::progress::show_loading;

/// Sweep cap handed to extended value iteration once per episode.
pub const EVI_STEP_CAP: usize = 1000;

/// One observed interaction: state, action, landing state, sampled reward.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub state: usize,
    pub action: usize,
    pub next_state: usize,
    pub reward: f64,
}

pub type History = Vec<Event>;

/// Start time and policy of one episode.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EpisodeRecord {
    pub start_time: usize,
    pub policy: Policy,
}

/// Per state-action visit statistics, accumulated from events.
pub(crate) struct StepStats {
    pub visits: Array2<u64>,            // [S, A]
    pub reward_sums: Array2<f64>,       // [S, A]
    pub transition_counts: Array3<u64>, // [S, A, S]
}

impl StepStats {
    pub fn zeros(num_states: usize, num_actions: usize) -> Self {
        Self {
            visits: Array2::zeros((num_states, num_actions)),
            reward_sums: Array2::zeros((num_states, num_actions)),
            transition_counts: Array3::zeros((num_states, num_actions, num_states)),
        }
    }

    pub fn record(&mut self, event: &Event) {
        self.visits[[event.state, event.action]] += 1;
        self.reward_sums[[event.state, event.action]] += event.reward;
        self.transition_counts[[event.state, event.action, event.next_state]] += 1;
    }

    /// Folds `other` into `self` and zeroes `other`.
    pub fn absorb(&mut self, other: &mut StepStats) {
        self.visits += &other.visits;
        self.reward_sums += &other.reward_sums;
        self.transition_counts += &other.transition_counts;
        other.visits.fill(0);
        other.reward_sums.fill(0.0);
        other.transition_counts.fill(0);
    }
}

/// UCRL2 on a sampling-only MDP.
///
/// Runs episodes of the optimism-in-the-face-of-uncertainty loop: refresh
/// the confidence region from all data seen before the episode, solve
/// extended value iteration for an optimistic policy, then play it until
/// some state-action pair doubles its visit count. `max_steps == 0` and
/// `max_episodes == 0` mean unlimited.
///
/// Returns the full event trace and the start time and policy of every
/// episode.
pub fn ucrl2<M: Sampler>(
    mdp: &mut M,
    delta: f64,
    max_steps: usize,
    max_episodes: usize,
) -> Result<(History, Vec<EpisodeRecord>)> {
    ucrl2_with_context(mdp, delta, max_steps, max_episodes, &[])
}

/// UCRL2 seeded with `context`, a trace of prior interaction replayed into
/// the statistics before the first episode. Time starts at
/// `context.len() + 1` and the start state is the last context landing state.
pub fn ucrl2_with_context<M: Sampler>(
    mdp: &mut M,
    delta: f64,
    max_steps: usize,
    max_episodes: usize,
    context: &[Event],
) -> Result<(History, Vec<EpisodeRecord>)> {
    if !(delta > 0.0 && delta < 1.0) {
        return Err(RlError::InvalidArgument(format!(
            "delta must lie in (0, 1), got {}",
            delta
        )));
    }

    let n = mdp.num_states();
    let num_actions = mdp.num_actions();
    let legal: Vec<Vec<usize>> = (0..n).map(|x| mdp.legal_actions(x).to_vec()).collect();

    // Statistics before the running episode (frozen while it plays) and
    // those gathered during it.
    let mut before = StepStats::zeros(n, num_actions);
    let mut during = StepStats::zeros(n, num_actions);
    for event in context {
        during.record(event);
    }

    let mut t = context.len() + 1;
    let mut state = match context.last() {
        Some(event) => event.next_state,
        None => mdp.state(),
    };

    let mut region = ConfidenceRegion::new(n, num_actions);
    let mut history: History = Vec::new();
    let mut episodes: Vec<EpisodeRecord> = Vec::new();
    let mut k = 0usize;

    loop {
        k += 1;
        before.absorb(&mut during);
        region.update(
            &legal,
            &before.visits,
            &before.reward_sums,
            &before.transition_counts,
            t,
            delta,
        )?;

        let tolerance = 1.0 / (t as f64).sqrt();
        let solution = extended_value_iteration(&region, &legal, EVI_STEP_CAP, tolerance)?;
        if !solution.converged {
            println!(
                "episode {}: optimistic planning hit the sweep cap (span tolerance {:.2e})",
                k, tolerance
            );
        }
        let policy = solution.policy;
        episodes.push(EpisodeRecord {
            start_time: t,
            policy: policy.clone(),
        });

        // Doubling-visits rule: play the policy until the pair under the
        // current state matches its pre-episode visit count.
        loop {
            let action = policy.action(state, 0);
            if during.visits[[state, action]] >= before.visits[[state, action]].max(1) {
                break;
            }
            let reward = mdp.step(action)?;
            let next_state = mdp.state();
            let event = Event {
                state,
                action,
                next_state,
                reward,
            };
            during.record(&event);
            history.push(event);
            state = next_state;
            t += 1;
            if max_steps > 0 {
                show_loading("Running UCRL2", t.min(max_steps), max_steps);
                if t >= max_steps {
                    break;
                }
            }
        }

        if (max_steps > 0 && t >= max_steps) || (max_episodes > 0 && k >= max_episodes) {
            break;
        }
    }

    Ok((history, episodes))
}
