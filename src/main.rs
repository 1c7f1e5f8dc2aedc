use tracing_subscriber::EnvFilter;
use twstrata::run_from_env;

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run_from_env() {
        tracing::error!("{}", err);
        std::process::exit(1);
    }
}
