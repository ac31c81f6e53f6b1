use clap::Parser;
use log::error;

use do_snapshot::cli::{self, Cli};
use do_snapshot::logging::init_logger;

fn main() {
    let cli = Cli::parse();

    // Уровень: RUST_LOG, иначе debug для --verbose/--dryrun, иначе info.
    if let Err(e) = init_logger(cli.verbose, cli.is_dry_run(), cli.syslog) {
        eprintln!("do-snapshot: {}", e);
        std::process::exit(1);
    }

    if let Err(e) = cli::run(cli) {
        // Логируем ошибку и выходим с кодом 1.
        error!("{:#}", e);
        std::process::exit(1);
    }
}
