use std::process::ExitCode;

fn main() -> ExitCode {
    parcelwise_cli::run()
}
