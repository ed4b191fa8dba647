use std::path::Path;

use pricing_dqn::cli::output::{
    print_items, print_success, ActionShareRow, OutputMode, SummaryRow,
};
use pricing_dqn::data::RetailDataLoader;
use pricing_dqn::error::Result;
use pricing_dqn::rl::training::{
    evaluate_policy, load_online_network, EvaluationSettings, InferenceBackend,
};
use pricing_dqn::rl::PricingEnvironment;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::info;

#[allow(clippy::too_many_arguments)]
pub(super) fn run_evaluate(
    data: &str,
    product: Option<&str>,
    checkpoint: &str,
    episodes: usize,
    steps: usize,
    epsilon: f64,
    seed: Option<u64>,
    output: &str,
    mode: OutputMode,
) -> Result<()> {
    let device = Default::default();
    let (network, state) = load_online_network::<InferenceBackend>(Path::new(checkpoint), &device)?;
    info!(
        "Loaded model from episode {} (best avg reward {:?})",
        state.episode, state.best_avg_reward
    );

    let mut loader = RetailDataLoader::new();
    if let Some(product) = product {
        loader = loader.with_product(product);
    }
    let rows = loader.load(data)?;

    let mut env = PricingEnvironment::from_config(rows, &state.config)?;
    let mut rng = match seed {
        Some(seed) => {
            env = env.with_seed(seed);
            StdRng::seed_from_u64(seed.wrapping_add(2))
        }
        None => StdRng::from_entropy(),
    };

    let settings = EvaluationSettings {
        episodes,
        steps_per_episode: steps,
        epsilon,
    };
    let report = evaluate_policy(&mut env, &network, &settings, &mut rng, &device)?;
    report.write_json(output)?;

    if mode == OutputMode::Json {
        return pricing_dqn::cli::output::print_item(&report);
    }

    let stat = |name: &str, s: &pricing_dqn::rl::training::SummaryStats| {
        SummaryRow::new(name, format!("{:.4} ± {:.4}", s.mean, s.std))
    };
    let rows = vec![
        SummaryRow::new("episodes", report.episodes),
        stat("reward", &report.reward),
        stat("revenue / step", &report.revenue),
        stat("margin / step", &report.margin),
        stat("volume / step", &report.volume),
    ];
    print_items(&rows, mode)?;
    print_items(
        &ActionShareRow::rows(env.action_space(), &report.action_distribution),
        mode,
    )?;
    print_success(&format!("Results saved to {}", output));
    Ok(())
}
