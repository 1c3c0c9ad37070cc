use clap::{Parser, Subcommand};

use commands::GlobalArgs;

mod commands;
mod output;

use commands::{config, param, step};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "buildstep")]
#[command(version = VERSION)]
#[command(about = "Templated build-step pipelines and parameter candidate lists for CI servers")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Plan or run a build step
    Step(step::StepArgs),
    /// Refresh and validate selectable build parameters
    Param(param::ParamArgs),
    /// Manage global buildstep configuration
    Config(config::ConfigArgs),
}

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    let global = GlobalArgs {};

    let (json_result, exit_code) = commands::run_json(cli.command, &global);
    output::print_json_result(json_result);

    std::process::ExitCode::from(exit_code_to_u8(exit_code))
}

fn exit_code_to_u8(code: i32) -> u8 {
    if code <= 0 {
        0
    } else if code >= 255 {
        255
    } else {
        code as u8
    }
}
