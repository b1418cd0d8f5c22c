use clap::Parser;
use httpspy::app::Config;

#[tokio::main]
async fn main() {
  let config = Config::parse();

  if let Err(e) = httpspy::app::run(config).await {
    eprintln!("error: {e}");
    std::process::exit(1);
  }
}
