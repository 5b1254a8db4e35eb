use std::process::ExitCode;
use clap::error::ErrorKind;
use clap::Parser;
use pirbench::cli::{self, Args, USAGE_EXAMPLES};
use pirbench::error;

fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(err) => {
            let _ = err.print();
            if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) {
                return ExitCode::SUCCESS;
            }
            eprintln!("\n{}", USAGE_EXAMPLES);
            return ExitCode::from(1);
        }
    };

    cli::init_tracing(args.verbose);

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("Failed to start async runtime: {}", err);
            return ExitCode::from(1);
        }
    };
    let outcome = runtime.block_on(cli::run(args));
    // An abandoned run may still hold a blocking thread inside a gateway call.
    runtime.shutdown_background();

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::debug!(?err, "benchmark failed");
            eprintln!("{}", error::user_friendly_message(&err));
            if error::is_input_error(&err) {
                eprintln!("\n{}", USAGE_EXAMPLES);
            }
            ExitCode::from(1)
        }
    }
}
