use tracing_subscriber::EnvFilter;

fn setup_logging(level: azdisc::cli::LogLevel) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_filter()));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn main() {
    let cli = azdisc::cli::parse();
    setup_logging(cli.log_level);
    let code = azdisc::app::run_cli(cli);
    if code != 0 {
        std::process::exit(code);
    }
}
