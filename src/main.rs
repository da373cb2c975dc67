//! Entry point for the `ratchet` binary.
//!
//! Parses arguments, applies environment-level settings while the process is
//! still single-threaded, then hands the command to the async runtime. Error
//! display and exit codes live here:
//!
//! - `1` - the run failed without mutating the installation
//! - `2` - a step failed and the installation was rolled back
//! - `3` - a rollback failed; the installation needs manual attention

use clap::Parser;
use ratchet_cli::cli::Cli;
use ratchet_cli::core::{RatchetError, user_friendly_error};

fn main() {
    let cli = Cli::parse();
    let config = cli.build_config();

    // SAFETY: the async runtime is not built yet, so no other thread exists
    // to observe the environment mutation.
    unsafe { config.apply_to_env() };

    // Set up colored output for Windows
    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Failed to start the async runtime: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = runtime.block_on(cli.execute_with_config(config)) {
        let exit_code = e.downcast_ref::<RatchetError>().map_or(1, RatchetError::exit_code);
        user_friendly_error(e).display();
        std::process::exit(exit_code);
    }
}
