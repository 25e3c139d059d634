use clap::Parser;

use tapevm::host::{self, Args};

fn main() {
    env_logger::init();
    let args = Args::parse();
    std::process::exit(host::run(args));
}
