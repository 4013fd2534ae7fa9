use std::process::ExitCode;

fn main() -> ExitCode {
    fitstore_cli::run()
}
