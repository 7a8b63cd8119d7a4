use crate::demo::{run_demo, run_route, DemoArgs, RouteArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use facility_router::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Facility Router",
    about = "Route clinical service requests to the best-matching facility",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Route a single request against the sample directory and print the decision
    Route(RouteArgs),
    /// Walk through a handful of routing decisions over the sample directory
    Demo(DemoArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Route(args) => run_route(args).await,
        Command::Demo(args) => run_demo(args).await,
    }
}
