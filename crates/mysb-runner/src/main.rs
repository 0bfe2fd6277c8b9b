use std::process::ExitCode;

use clap::Parser;
use mysb_runner::cli::{Cli, Command};
use mysb_runner::{commands, logging, Result};

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(command: Command) -> Result<()> {
    let mut stdout = std::io::stdout().lock();

    match command {
        Command::Serve {
            config,
            listen,
            #[cfg(feature = "prometheus")]
            metrics,
        } => {
            #[cfg(not(feature = "prometheus"))]
            let metrics = None;
            let config = commands::load_config(config.as_deref())?;
            commands::serve(&config, listen, metrics)
        }
        Command::Inspect {
            file,
            json,
            dump,
            strict,
        } => commands::inspect(&mut stdout, &file, json, dump, strict),
        Command::Resolve {
            config,
            node,
            firmware_type,
            version,
            json,
        } => {
            let config = commands::load_config(config.as_deref())?;
            commands::resolve(&mut stdout, &config, &node, firmware_type, version, json)
        }
        Command::Handle {
            config,
            topic,
            payload,
        } => {
            let config = commands::load_config(config.as_deref())?;
            commands::handle(&mut stdout, &config, &topic, &payload).map(|_| ())
        }
    }
}
