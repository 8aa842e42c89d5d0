use clap::Parser;

pub mod verify;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "evm-circuit",
    version = "0.1",
    about = "evm-circuit - checks EVM execution steps against the circuit constraints"
)]
pub enum Commands {
    #[command(name = "verify")]
    Verify(verify::VerifyArgs),
}
