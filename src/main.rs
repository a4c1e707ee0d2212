use clap::Parser;

#[tokio::main]
async fn main() {
    let cli = weathergate::cli::Cli::parse();
    if let Err(e) = weathergate::cmd::dispatch(cli).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
