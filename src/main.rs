use produce_prices::cli;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let result = cli::parse_args(std::env::args().skip(1)).and_then(cli::run);
    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
