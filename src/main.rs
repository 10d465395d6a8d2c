use clap::error::ErrorKind;
use clap::Parser;
use colored::Colorize;
use graft::cli::Cli;
use graft::driver;
use graft::exit::GraftExit;

fn main() -> GraftExit {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            let _ = e.print();
            return GraftExit::Success;
        }
        Err(e) => {
            // Argument errors exit 1, not clap's default 2.
            let _ = e.print();
            return GraftExit::Error;
        }
    };

    match driver::run(&cli) {
        Ok(exit) => exit,
        Err(e) => {
            eprintln!("{} {e:#}", "Error:".red());
            GraftExit::Error
        }
    }
}
