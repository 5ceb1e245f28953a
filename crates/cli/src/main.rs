use std::process::ExitCode;

fn main() -> ExitCode {
    smsdesk_cli::run()
}
