use crate::demo::{run_demo, DemoArgs};
use crate::offline::{self, ExportArgs, ImportArgs, LoginArgs, SessionArgs, StatsArgs, TrackArgs};
use crate::server;
use activity_portal::error::AppError;
use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "Activity Portal",
    about = "Run the school activity registration portal and its admin tooling",
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
    /// Bulk-register students from a roster CSV into the data file
    ImportStudents(ImportArgs),
    /// Export an activity's applicants as CSV
    Export(ExportArgs),
    /// Show headline totals and the per-room applicant table
    Stats(StatsArgs),
    /// Sign in as a student and remember the session
    Login(LoginArgs),
    /// Forget the remembered student session
    Logout(SessionArgs),
    /// Show the signed-in student's profile
    Whoami(SessionArgs),
    /// Apply for an activity as the signed-in student
    Apply(TrackArgs),
    /// Withdraw the signed-in student's application
    Cancel(TrackArgs),
    /// Walk through a registration round against a throwaway store
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
        Command::ImportStudents(args) => offline::import_students(args),
        Command::Export(args) => offline::export(args),
        Command::Stats(args) => offline::stats(args),
        Command::Login(args) => offline::login(args),
        Command::Logout(args) => offline::logout(args),
        Command::Whoami(args) => offline::whoami(args),
        Command::Apply(args) => offline::apply(args),
        Command::Cancel(args) => offline::cancel(args),
        Command::Demo(args) => run_demo(args),
    }
}
