use std::process::ExitCode;

fn main() -> ExitCode {
    pulsedesk_cli::run()
}
