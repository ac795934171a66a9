mod commands;

use clap::Parser;
use tictac_core::domain::TicTacError;

pub fn run_from_env() -> i32 {
    match parse_and_dispatch(std::env::args().collect()) {
        Ok(code) => code,
        Err(error) => {
            let diagnostic = error.as_tictac_error();
            eprintln!("{}", diagnostic.diagnostic_line());
            if let Some(summary_line) = diagnostic.fatal_exit_line() {
                eprintln!("{}", summary_line);
            }
            diagnostic.exit_code()
        }
    }
}

fn parse_and_dispatch(args: Vec<String>) -> Result<i32, CliError> {
    match Cli::try_parse_from(&args) {
        Ok(cli) => dispatch_parsed(cli.command),
        Err(err) => match err.kind() {
            clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion => {
                print!("{}", err);
                Ok(0)
            }
            _ => Err(CliError::Usage(err.to_string())),
        },
    }
}

#[derive(Parser)]
#[command(
    name = "tictac",
    version,
    about = "Wave-packet Faddeev solver for nucleon-deuteron scattering"
)]
struct Cli {
    #[command(subcommand)]
    command: CliCommand,
}

#[derive(clap::Subcommand)]
enum CliCommand {
    /// Solve the three-body equations at every configured energy
    Run(commands::RunArgs),
    /// Assemble or load the exchange operator of every block
    Permutation(commands::PermutationArgs),
    /// Two-body phase shifts and bound states of the configured potential
    PhaseShifts(commands::PhaseShiftArgs),
    /// Print the default configuration as JSON
    Config,
}

fn dispatch_parsed(command: CliCommand) -> Result<i32, CliError> {
    match command {
        CliCommand::Run(args) => commands::run_solver_command(args),
        CliCommand::Permutation(args) => commands::run_permutation_command(args),
        CliCommand::PhaseShifts(args) => commands::run_phase_shift_command(args),
        CliCommand::Config => commands::run_config_command(),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("{0}")]
    Usage(String),
    #[error("{0}")]
    Compute(TicTacError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<TicTacError> for CliError {
    fn from(error: TicTacError) -> Self {
        Self::Compute(error)
    }
}

impl CliError {
    fn as_tictac_error(&self) -> TicTacError {
        match self {
            Self::Usage(message) => {
                TicTacError::input_validation("INPUT.CLI_USAGE", message.clone())
            }
            Self::Compute(error) => error.clone(),
            Self::Internal(error) => TicTacError::io_system("IO.CLI", format!("{error:#}")),
        }
    }
}
