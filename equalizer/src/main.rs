use equalizer::args::Arguments;
use equalizer::cluster;
use equalizer::error::{self, Result};
use equalizer::run::{self, RunOutcome, RunSettings, EXIT_FAILURE};
use models::eviction::K8SEvictionClient;
use models::inventory::K8SInventoryClient;
use models::telemetry;

use snafu::ResultExt;
use std::io;
use std::process;
use tracing::{event, Level};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let args: Arguments = argh::from_env();

    let exit_code = match run_equalizer(args).await {
        Ok(outcome) => outcome.exit_code(),
        Err(error) => {
            eprintln!("Error: {}", error);
            EXIT_FAILURE
        }
    };
    process::exit(exit_code);
}

async fn run_equalizer(args: Arguments) -> Result<RunOutcome> {
    telemetry::init_telemetry_from_env().context(error::TelemetryInitSnafu)?;

    let k8s_client =
        cluster::create_client(args.kubeconfig.as_deref(), args.context.as_deref()).await?;
    let inventory = K8SInventoryClient::new(k8s_client.clone());
    let evictor = K8SEvictionClient::new(k8s_client);

    let settings = RunSettings::from(&args);
    let stdout = io::stdout();
    let mut out = stdout.lock();
    let outcome = run::run(&settings, &inventory, evictor, &mut out).await?;

    event!(Level::INFO, ?outcome, "Run complete");
    Ok(outcome)
}
