use anyhow::Result;
use clap::Parser;

mod args;
mod cmd;
mod output;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = args::Cli::parse();
    output::init(cli.json);
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();

    if let Err(e) = cmd::dispatch(cli).await {
        let exit_code = e
            .chain()
            .find_map(|cause| cause.downcast_ref::<semindex_core::errors::IndexError>())
            .map(|err| err.exit_code())
            .unwrap_or(1);
        output::eprintln_line(&format!("error: {e:#}"));
        std::process::exit(exit_code);
    }
    Ok(())
}
