//! cloudscript CLI — inspect, fill and simulate infrastructure-change scripts.

use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "cloudscript",
    version,
    about = "Template IR for ordered infrastructure-change scripts — holes, references, canonical rendering"
)]
struct Cli {
    #[command(subcommand)]
    command: cloudscript::cli::Commands,
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = cloudscript::cli::dispatch(cli.command) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}
