mod argparse;
mod commands;
mod utils;

use argparse::parse_args;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    let cli = parse_args();
    utils::init_logger(cli.verbose);

    commands::handle_command(cli.command).await
}
