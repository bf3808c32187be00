use clap::Parser;
use ndarray::prelude::*;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use std::fs::{self, File};
use std::io::Write;
use ucrl2::*;

mod plotting;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "regret")]
    experiment: String,

    /// Number of river states.
    #[arg(short, long, default_value_t = 5)]
    n: usize,

    /// Step budget for the learner.
    #[arg(short, long, default_value_t = 20000)]
    t: usize,

    #[arg(long, default_value_t = 1e-4)]
    delta: f64,

    #[arg(long, default_value_t = 8)]
    n_seeds: usize,

    /// Steps for the simulated invariant measure.
    #[arg(long, default_value_t = 1000000)]
    sim_steps: usize,
}

fn main() {
    let args = Args::parse();

    match args.experiment.as_str() {
        "planning" => run_planning(&args),
        "regret" => run_regret(&args),
        "replay" => run_replay(&args),
        "convergence" => run_convergence(&args),
        _ => println!("Unknown experiment: {}", args.experiment),
    }
}

fn run_planning(args: &Args) {
    let mdp = river_swim(args.n, 0.35, 0.05, 0.1, 0.9, 42).unwrap();
    mdp.show();

    let solution = value_iteration(&mdp, 1_000_000, 1e-8).unwrap();
    solution.policy.show();
    println!("Gain: {:.6}", solution.gain);
    println!("Bias: {:?}", solution.bias);
    if !solution.converged {
        println!("Warning: value iteration ran out of sweeps");
    }

    let planned = invariant_measure(&mdp, &solution.policy).unwrap();
    println!("Invariant measure from value iteration is supposed to be:");
    for w in &planned {
        print!("{:12.6} ", w);
    }
    println!();

    let mut sim = river_swim(args.n, 0.35, 0.05, 0.1, 0.9, 43).unwrap();
    let mut agent = Agent::new(&mut sim, solution.policy.clone(), 44);
    let estimated = invariant_measure_estimate(&mut agent, args.sim_steps).unwrap();
    println!(
        "Invariant measure after {} steps is estimated to be:",
        args.sim_steps
    );
    for w in &estimated {
        print!("{:12.6} ", w);
    }
    println!();

    let gaps = bellman_gaps(&mdp, solution.gain, &solution.bias);
    println!("Bellman gaps:");
    for x in 0..args.n {
        println!("  state {}: LEFT {:.6}  RIGHT {:.6}", x, gaps[[x, LEFT]], gaps[[x, RIGHT]]);
    }
}

fn run_regret(args: &Args) {
    let optimal = value_iteration(
        &river_swim(args.n, 0.35, 0.05, 0.1, 0.9, 0).unwrap(),
        1_000_000,
        1e-8,
    )
    .unwrap();
    let optimal_gain = optimal.gain;
    println!("Optimal gain: {:.6}", optimal_gain);

    let master_seed = 42;
    let mut rng = rand::rngs::StdRng::seed_from_u64(master_seed);
    let mut agent_seeds = Vec::new();
    for _ in 0..args.n_seeds {
        agent_seeds.push(rng.gen::<u64>());
    }

    println!("Running UCRL2 over {} seeds...", args.n_seeds);
    let curves: Vec<Vec<f64>> = agent_seeds
        .par_iter()
        .map(|&seed| {
            let mut mdp = river_swim(args.n, 0.35, 0.05, 0.1, 0.9, seed).unwrap();
            let (history, _) = ucrl2(&mut mdp, args.delta, args.t, 0).unwrap();
            let mut curve = Vec::with_capacity(history.len());
            let mut earned = 0.0;
            for (i, event) in history.iter().enumerate() {
                earned += event.reward;
                curve.push(optimal_gain * (i + 1) as f64 - earned);
            }
            curve
        })
        .collect();

    let folder = format!("RegretCurves_N{}_T{}", args.n, args.t);
    fs::create_dir_all(&folder).unwrap();
    let dat_path = format!("{}/UCRL2.dat", folder);
    save_regret_data(&dat_path, &curves);

    println!("Generating plots...");
    if let Err(e) = plotting::plot_regret_curve(&dat_path, &format!("{}/ucrl2_regret.png", folder))
    {
        eprintln!("Error plotting regret: {}", e);
    }
}

fn save_regret_data(path: &str, curves: &[Vec<f64>]) {
    let n_seeds = curves.len();
    let len = curves.iter().map(|c| c.len()).min().unwrap_or(0);
    if len == 0 {
        return;
    }

    let mut cumulative = Array2::<f64>::zeros((n_seeds, len));
    for (i, curve) in curves.iter().enumerate() {
        for j in 0..len {
            cumulative[[i, j]] = curve[j];
        }
    }
    let mean = cumulative.mean_axis(Axis(0)).unwrap();
    let std = cumulative.std_axis(Axis(0), 0.0);

    let num_points = 200.min(len);
    let mut file = File::create(path).unwrap();
    writeln!(file, "Step CumulativeRegret StdDev").unwrap();
    for i in 0..num_points {
        let idx = (i * len) / num_points;
        writeln!(file, "{} {:.6} {:.6}", idx + 1, mean[idx], std[idx]).unwrap();
    }
    println!("Saved {}", path);
}

fn run_replay(args: &Args) {
    let mut mdp = river_swim(args.n, 0.35, 0.05, 0.1, 0.9, 42).unwrap();
    let budget = args.t.min(2000);
    let (history, episodes) = ucrl2(&mut mdp, args.delta, budget, 0).unwrap();

    let reference = value_iteration(
        &river_swim(args.n, 0.35, 0.05, 0.1, 0.9, 0).unwrap(),
        1_000_000,
        1e-8,
    )
    .unwrap()
    .policy;

    let bad_start = find_bad_episode(&episodes, &reference, 1);
    if bad_start == 0 {
        println!("Every episode already plays the reference policy");
        return;
    }
    let suspicious = episodes
        .iter()
        .find(|e| e.start_time == bad_start)
        .unwrap();
    println!("First suboptimal episode starts at t={}", bad_start);
    suspicious.policy.show();

    let legal = vec![vec![LEFT, RIGHT]; args.n];
    let (optimist, pinned) =
        performance_comparison(&history, &suspicious.policy, &legal, 2, args.delta).unwrap();

    let dat_path = "replay_gains.dat";
    let mut file = File::create(dat_path).unwrap();
    writeln!(file, "Step OptimistGain PolicyGain").unwrap();
    for (i, (o, p)) in optimist.iter().zip(pinned.iter()).enumerate() {
        writeln!(file, "{} {:.6} {:.6}", i + 1, o, p).unwrap();
    }
    println!("Saved {}", dat_path);

    println!("Generating plots...");
    if let Err(e) = plotting::plot_gain_comparison(
        dat_path,
        "replay_gains.png",
        "unrestricted optimist",
        "episode policy",
    ) {
        eprintln!("Error plotting gains: {}", e);
    }
}

fn run_convergence(args: &Args) {
    // Watch the optimistic gain collapse onto the achievable one as the
    // confidence region tightens around the true river.
    let optimal = value_iteration(
        &river_swim(args.n, 0.35, 0.05, 0.1, 0.9, 0).unwrap(),
        1_000_000,
        1e-8,
    )
    .unwrap();
    println!("Optimal gain: {:.6}", optimal.gain);

    let mut mdp = river_swim(args.n, 0.35, 0.05, 0.1, 0.9, 42).unwrap();
    let budget = args.t.min(3000);
    let (history, _) = ucrl2(&mut mdp, args.delta, budget, 0).unwrap();

    let legal = vec![vec![LEFT, RIGHT]; args.n];
    let (optimist, pinned) =
        performance_comparison(&history, &optimal.policy, &legal, 2, args.delta).unwrap();

    let dat_path = "convergence_gains.dat";
    let mut file = File::create(dat_path).unwrap();
    writeln!(file, "Step OptimistGain OptimalPolicyGain").unwrap();
    for (i, (o, p)) in optimist.iter().zip(pinned.iter()).enumerate() {
        writeln!(file, "{} {:.6} {:.6}", i + 1, o, p).unwrap();
    }
    println!("Saved {}", dat_path);

    let tail = optimist.len() / 10;
    if tail > 0 {
        let late: f64 = optimist[optimist.len() - tail..].iter().sum::<f64>() / tail as f64;
        println!(
            "Mean optimistic gain over the last tenth: {:.6} (excess {:.6})",
            late,
            late - optimal.gain
        );
    }

    println!("Generating plots...");
    if let Err(e) = plotting::plot_gain_comparison(
        dat_path,
        "convergence_gains.png",
        "unrestricted optimist",
        "optimal policy",
    ) {
        eprintln!("Error plotting gains: {}", e);
    }
}
