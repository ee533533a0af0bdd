use std::process::ExitCode;

fn main() -> ExitCode {
    cmdbot_cli::run()
}
