use std::process::ExitCode;

fn main() -> ExitCode {
    match repofleet::cli::run() {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            repofleet::ui::output::error(format!("{:#}", err));
            ExitCode::from(1)
        }
    }
}
