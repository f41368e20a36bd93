use std::process::ExitCode;

fn main() -> ExitCode {
    fsal_daemon::run(std::env::args_os())
}
