mod cli;
mod demo;
mod infra;
mod offline;
mod routes;
mod server;

use activity_portal::error::AppError;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}
