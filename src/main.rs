use std::env;
use std::process;

use sixlang::runner;

pub fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let opts = match runner::parse_args(&args) {
        Ok(opts) => opts,
        Err(message) => {
            eprintln!("{message}");
            process::exit(64);
        }
    };

    process::exit(runner::run(&opts));
}
