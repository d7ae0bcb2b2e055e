use serde_json::json;
use tender_db::{connect_with_config, migrations};

use crate::commands::{build_runtime, load_config, CommandResult};

pub fn run(status_only: bool) -> CommandResult {
    let config = match load_config("migrate") {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let runtime = match build_runtime("migrate") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        let pool = connect_with_config(&config.database)
            .await
            .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;

        let pending = migrations::pending_versions(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), 5u8))?;
        if !status_only {
            migrations::run_pending(&pool)
                .await
                .map_err(|error| ("migration", error.to_string(), 5u8))?;
        }
        let applied = migrations::applied_versions(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), 5u8))?;

        pool.close().await;
        Ok::<_, (&'static str, String, u8)>((pending, applied))
    });

    match result {
        Ok((pending, applied)) if status_only => CommandResult::success_with(
            "migrate",
            format!("{} applied, {} pending", applied.len(), pending.len()),
            Some(json!({ "applied": applied, "pending": pending })),
        ),
        Ok((pending, applied)) => CommandResult::success_with(
            "migrate",
            format!("applied {} pending migration(s)", pending.len()),
            Some(json!({ "applied": applied, "newly_applied": pending })),
        ),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("migrate", error_class, message, exit_code)
        }
    }
}
