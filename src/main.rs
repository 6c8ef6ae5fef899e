//! census - ward shift census and approval workflow

use std::process::ExitCode;

fn main() -> ExitCode {
    if let Err(e) = ward_census::cli::run() {
        eprintln!("Error: {:#}", e);
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
