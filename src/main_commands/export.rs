use std::path::Path;

use pricing_dqn::cli::output::{print_items, print_success, ActionShareRow, OutputMode};
use pricing_dqn::error::Result;
use pricing_dqn::rl::core::PriceActionSpace;
use pricing_dqn::rl::training::{export_policy, load_online_network, InferenceBackend};
use tracing::info;

pub(super) fn run_export(checkpoint: &str, output: &str, mode: OutputMode) -> Result<()> {
    let device = Default::default();
    let (network, state) = load_online_network::<InferenceBackend>(Path::new(checkpoint), &device)?;
    info!(
        "Exporting policy from episode {} over {} states",
        state.episode,
        state.layout.total_states()
    );

    let table = export_policy(&network, &state.layout, &device)?;
    table.write_json(output)?;

    let actions = PriceActionSpace::new(state.config.actions.multipliers.clone())?;
    print_items(
        &ActionShareRow::rows(&actions, &table.action_distribution()),
        mode,
    )?;
    print_success(&format!("Exported {} states to {}", table.len(), output));
    Ok(())
}
