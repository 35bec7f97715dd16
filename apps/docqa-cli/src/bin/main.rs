use clap::Parser;

use docqa_cli::args::Cli;
use docqa_cli::render::render_any;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    docqa_cli::init_tracing();
    if let Err(e) = docqa_cli::run(cli).await {
        eprintln!("{}", render_any(&e));
        std::process::exit(1);
    }
}
