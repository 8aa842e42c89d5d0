use clap::{arg, Parser};
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
pub struct VerifyArgs {
    #[arg(
        short = 'w',
        long,
        value_name = "WITNESS_PATH",
        help = "JSON file holding the randomness, the tables and the steps"
    )]
    pub witness: PathBuf,

    #[arg(long, help = "check the steps in parallel")]
    pub parallel: bool,

    #[arg(
        long,
        help = "the steps are a segment that does not start at the first step of the block"
    )]
    pub no_begin_with_first_step: bool,

    #[arg(
        long,
        help = "the steps are a segment that does not end at the last step of the block"
    )]
    pub no_end_with_last_step: bool,
}
