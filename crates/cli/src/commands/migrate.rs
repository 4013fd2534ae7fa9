use fitstore_core::config::LoadOptions;

use crate::commands::{run_with_database, CommandResult};

pub fn run(options: &LoadOptions) -> CommandResult {
    let result = run_with_database("migrate", options, |_config, _pool| async { Ok(()) });

    match result {
        Ok(()) => CommandResult::success("migrate", "applied pending migrations"),
        Err(failure) => failure,
    }
}
