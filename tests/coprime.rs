//! Scenarios on the coprime playground, where the legal action set differs
//! from state to state.

use ucrl2::*;

#[test]
fn random_walk_respects_the_legal_sets() {
    let mut mdp = coprime_mdp(31).unwrap();
    let legal: Vec<Vec<usize>> = (0..10).map(|x| mdp.legal_actions(x).to_vec()).collect();

    let policy = Policy::stationary(vec![0; 10]).unwrap();
    let mut agent = Agent::new(&mut mdp, policy, 5);

    let mut earned = 0.0;
    for _ in 0..200 {
        let before = agent.mdp().state();
        let (action, reward) = agent.step_random().unwrap();
        assert!(legal[before].contains(&action));
        assert!(reward == 0.0 || reward == 1.0);
        earned += reward;
    }
    assert_eq!(agent.mdp().time(), 200);
    assert!((agent.mdp().total_reward() - earned).abs() < 1e-9);
}

#[test]
fn planning_only_picks_legal_actions() {
    let mdp = coprime_mdp(0).unwrap();
    let solution = value_iteration(&mdp, 1_000_000, 1e-8).unwrap();
    assert!(solution.converged);
    for x in 0..10 {
        assert!(mdp.legal_actions(x).contains(&solution.policy.action(x, 0)));
    }
    assert!(solution.gain > 0.0 && solution.gain <= 0.9);
    assert_eq!(solution.bias[0], 0.0);
}

#[test]
fn the_learner_only_plays_legal_actions() {
    let mut mdp = coprime_mdp(77).unwrap();
    let legal: Vec<Vec<usize>> = (0..10).map(|x| mdp.legal_actions(x).to_vec()).collect();

    let (history, episodes) = ucrl2(&mut mdp, 0.05, 1_500, 0).unwrap();
    assert_eq!(history.len(), 1_499);
    for event in &history {
        assert!(legal[event.state].contains(&event.action));
    }
    // Episode policies must be playable wherever the walk can stand.
    for record in &episodes {
        for x in 0..10 {
            assert!(legal[x].contains(&record.policy.action(x, 0)));
        }
    }
}
