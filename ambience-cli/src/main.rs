//! # Ambience
//!
//! A command-line driver for the ambient sound mixer.

use log::error;

mod cli;
mod logging;
mod runner;
mod status;

fn main() {
    logging::init();
    let args = cli::args::build_cli().get_matches();

    let code = match runner::run(&args) {
        Ok(code) => code,
        Err(err) => {
            error!("{}", err);
            -1
        }
    };

    std::process::exit(code)
}
