use std::process::ExitCode;

fn main() -> ExitCode {
    tender_cli::run()
}
