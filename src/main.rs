use callscribe::app;
use callscribe::cli::Cli;
use clap::Parser;

fn main() {
    let cli = Cli::parse();
    std::process::exit(app::run(cli));
}
