use std::path::Path;

use pricing_dqn::cli::output::{print_item, print_items, print_kv, print_warn, OutputMode, SummaryRow};
use pricing_dqn::error::Result;
use pricing_dqn::rl::training::{read_state, Checkpointer};

pub(super) fn run_info(checkpoint: &str, mode: OutputMode) -> Result<()> {
    let state = read_state(Path::new(checkpoint))?;
    if mode == OutputMode::Json {
        return print_item(&state);
    }

    let rows = vec![
        SummaryRow::new("episode", state.episode),
        SummaryRow::new("total steps", state.total_steps),
        SummaryRow::new("epsilon", format!("{:.4}", state.epsilon)),
        SummaryRow::new(
            "best avg reward",
            state
                .best_avg_reward
                .map(|r| format!("{r:.4}"))
                .unwrap_or_else(|| "-".to_string()),
        ),
        SummaryRow::new("actions", state.num_actions()),
        SummaryRow::new("discrete states", state.layout.total_states()),
        SummaryRow::new("extended state", state.layout.extended),
        SummaryRow::new("saved at", state.saved_at.to_rfc3339()),
    ];
    print_items(&rows, mode)
}

pub(super) fn run_list(dir: &str, mode: OutputMode) -> Result<()> {
    let checkpointer = Checkpointer::new(dir);
    let names = checkpointer.list_checkpoints();
    if names.is_empty() {
        print_warn(&format!("No checkpoints in {}", dir));
        return Ok(());
    }

    match mode {
        OutputMode::Json => print_item(&names),
        OutputMode::Table => {
            let latest = checkpointer.latest_checkpoint();
            for name in &names {
                let marker = if latest.as_deref() == Some(name.as_str()) {
                    " (latest)"
                } else {
                    ""
                };
                print_kv(name, &format!("{:?}{}", checkpointer.checkpoint_path(name), marker));
            }
            Ok(())
        }
    }
}
