use std::process::ExitCode;

fn main() -> ExitCode {
    match diagd::run_server() {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            tracing::error!(target: "diagd::process", error = %error, "diagnostics server failed");
            ExitCode::FAILURE
        }
    }
}
