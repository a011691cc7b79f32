//! CLI smoke entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `rawtalk_core` linkage.
//! - Keep output deterministic for quick local sanity checks.

use rawtalk_core::db::{migrations::latest_version, open_db_in_memory};
use std::process::ExitCode;

fn main() -> ExitCode {
    println!("rawtalk_core ping={}", rawtalk_core::ping());
    println!("rawtalk_core version={}", rawtalk_core::core_version());
    println!("rawtalk_core schema_version={}", latest_version());
    println!(
        "rawtalk_core less_popular_threshold={}",
        rawtalk_core::LESS_POPULAR_THRESHOLD
    );

    match open_db_in_memory() {
        Ok(_) => {
            println!("rawtalk_core db_bootstrap=ok");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("rawtalk_core db_bootstrap=error error={err}");
            ExitCode::FAILURE
        }
    }
}
