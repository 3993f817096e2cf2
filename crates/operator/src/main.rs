use std::sync::Arc;

use clap::Parser;
use kube::Client;
use tracing::info;
use tracing_subscriber::EnvFilter;

use trainjob_operator::{
    config::Config,
    controllers::TrainJobController,
    gang::{DisabledGangAdmission, GangAdmission, PodGroupGangAdmission},
    metrics,
    server::Server,
};

#[derive(Parser, Debug)]
#[command(name = "trainjob-operator", about = "Operator for distributed ML training jobs")]
struct Args {
    /// Namespace to watch; all namespaces when omitted
    #[arg(long)]
    namespace: Option<String>,

    /// Consume the gang scheduler's PodGroup completion signal
    #[arg(long)]
    enable_gang_scheduling: bool,

    /// Address for the health and metrics endpoints
    #[arg(long)]
    metrics_addr: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let mut config = Config::load()?;
    if args.namespace.is_some() {
        config.kube.namespace = args.namespace;
    }
    if args.enable_gang_scheduling {
        config.gang.enabled = true;
    }
    if let Some(addr) = args.metrics_addr {
        config.server.addr = addr;
    }
    info!("Loaded configuration: {:?}", config);

    metrics::register_metrics();

    let client = Client::try_default().await?;

    let gang: Arc<dyn GangAdmission> = if config.gang.enabled {
        Arc::new(PodGroupGangAdmission::new(client.clone()))
    } else {
        Arc::new(DisabledGangAdmission)
    };

    let controller = Arc::new(TrainJobController::new(
        client,
        gang,
        config.kube.namespace.clone(),
        config.kube.requeue_seconds,
    ));

    let addr = config.server.addr.clone();
    tokio::spawn(async move {
        info!("Starting metrics server on {}", addr);
        if let Err(e) = Server::start(&addr).await {
            tracing::error!("Metrics server error: {}", e);
        }
    });

    controller.run().await;

    Ok(())
}
