use clap::Parser;

#[tokio::main]
async fn main() {
    let cli = vodexctl::Cli::parse();
    match vodexctl::run(cli).await {
        Ok(status) => std::process::exit(status),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(1);
        }
    }
}
