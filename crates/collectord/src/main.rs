use std::process::ExitCode;

fn main() -> ExitCode {
    match collectord::run_collector() {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("collectord: {error}");
            ExitCode::FAILURE
        }
    }
}
