//! libc-unify - Multi-arch C library tree unifier
//!
//! Entry point for the libc-unify CLI application.

use clap::Parser;
use libc_unify::{
    cli::{Cli, OutputFormat},
    error::{ExitCode, StructuredError},
};

fn main() {
    let cli = Cli::parse();
    let json_errors = cli.format == OutputFormat::Json;

    match libc_unify::run_app(cli) {
        Ok(code) => std::process::exit(code.as_i32()),
        Err(err) => {
            let exit_code = ExitCode::for_error(&err);

            // Errors go to stdout, next to where the summary would have been
            if json_errors {
                let structured = StructuredError::new(&err, exit_code);
                match serde_json::to_string(&structured) {
                    Ok(json) => println!("{}", json),
                    Err(_) => println!("Error: {}", err),
                }
            } else {
                println!("Error: {}", err);
            }

            std::process::exit(exit_code.as_i32());
        }
    }
}
