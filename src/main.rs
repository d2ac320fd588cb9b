use clap::Parser;
use segue::cli::Cli;
use segue::error::AppError;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let cli = Cli::parse();
    segue::commands::run(cli).await
}
