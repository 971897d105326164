use std::process::ExitCode;

fn main() -> ExitCode {
    meshfit_cli::run_view()
}
