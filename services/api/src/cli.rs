use crate::demo::{run_demo, run_request_listing, DemoArgs, RequestListingArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use housing_allocation::error::AppError;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "Housing Allocation Service",
    about = "Run and inspect the housing-project allocation service from the command line",
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
    /// Inspect persisted requests
    Requests {
        #[command(subcommand)]
        command: RequestsCommand,
    },
    /// Walk through an application, booking, and withdrawal against in-memory stores
    Demo(DemoArgs),
}

#[derive(Subcommand, Debug)]
enum RequestsCommand {
    /// List requests from the record files, optionally narrowed to one project or status
    List(RequestListingArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
    /// Override the directory holding the record files
    #[arg(long)]
    pub(crate) data_dir: Option<PathBuf>,
    /// Override the directory holding CSV seed files
    #[arg(long)]
    pub(crate) seed_dir: Option<PathBuf>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Requests {
            command: RequestsCommand::List(args),
        } => run_request_listing(args),
        Command::Demo(args) => run_demo(args),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use housing_allocation::workflows::allocation::RequestStatus;

    #[test]
    fn serve_is_the_default_command() {
        let cli = Cli::try_parse_from(["housing-allocation-api"]).expect("parses");
        assert!(cli.command.is_none());
    }

    #[test]
    fn request_listing_accepts_filters() {
        let cli = Cli::try_parse_from([
            "housing-allocation-api",
            "requests",
            "list",
            "--project",
            "P001",
            "--status",
            "pending",
        ])
        .expect("parses");

        match cli.command {
            Some(Command::Requests {
                command: RequestsCommand::List(args),
            }) => {
                assert_eq!(args.project.as_deref(), Some("P001"));
                assert_eq!(args.status, Some(RequestStatus::Pending));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn demo_rejects_malformed_dates() {
        let result =
            Cli::try_parse_from(["housing-allocation-api", "demo", "--today", "03/01/2025"]);
        assert!(result.is_err());
    }
}
