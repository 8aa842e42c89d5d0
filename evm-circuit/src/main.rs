use clap::Parser;
use evm_circuit::{
    cli,
    evm::{verify_steps, verify_steps_parallel, witness::Witness},
    lookups::Tables,
};
use log::info;
use std::{fs::File, io::BufReader, process::ExitCode};

fn read_witness(args: &cli::verify::VerifyArgs) -> Result<Witness, String> {
    let file = File::open(&args.witness)
        .map_err(|err| format!("cannot open {}: {err}", args.witness.display()))?;
    serde_json::from_reader(BufReader::new(file))
        .map_err(|err| format!("cannot parse {}: {err}", args.witness.display()))
}

fn verify_main(args: cli::verify::VerifyArgs) -> ExitCode {
    let witness = match read_witness(&args) {
        Ok(witness) => witness,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::FAILURE;
        }
    };
    info!(
        "verifying {} steps against {} rw rows",
        witness.steps.len(),
        witness.tables.rw.len()
    );
    let tables = Tables::new(witness.tables);
    let verify = if args.parallel {
        verify_steps_parallel
    } else {
        verify_steps
    };
    match verify(
        &tables,
        &witness.steps,
        witness.randomness,
        !args.no_begin_with_first_step,
        !args.no_end_with_last_step,
    ) {
        Ok(()) => {
            info!("all steps verified");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}

pub fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = cli::Commands::parse();
    match args {
        cli::Commands::Verify(args) => verify_main(args),
    }
}
