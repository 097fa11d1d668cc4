use datahub_actions::entrypoint::entrypoint;
use datahub_actions::helpers::env::process_env;
use datahub_actions::instrumentation::logging::init_panic_handler;
use std::process::ExitCode;

fn main() -> ExitCode {
    init_panic_handler();

    // The shell parses arguments, sets up logging and dispatches the sub-command.
    ExitCode::from(entrypoint::run(std::env::args_os(), &process_env()))
}
