use std::process::ExitCode;

fn main() -> ExitCode {
    landlord_cli::run()
}
