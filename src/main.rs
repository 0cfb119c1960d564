use anyhow::{anyhow, Context, Result};
use stargate_exec::chains::{Backend, ChainBackend, ChainFamily, EvmBackend, SolanaBackend};
use stargate_exec::config::AppConfig;
use stargate_exec::errors::ExecError;
use stargate_exec::router::{cancel_pair, select_route, RouteExecutor};
use stargate_exec::signing::{parse_evm_signer, SolanaKeypair};
use stargate_exec::transport::{JsonRpc, RouteFetcher};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing().context("initialize tracing subscriber")?;

    if let Err(err) = run().await {
        error!(error = ?err, "stargate transfer failed");
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> Result<()> {
    let config = AppConfig::load().context("load configuration")?;
    let request = config.transfer_request().context("build transfer request")?;

    let fetcher = RouteFetcher::new(
        config.stargate_api()?,
        config.route_endpoint(),
        config.http_timeout(),
    )
    .context("initialize Stargate client")?;
    let routes = fetcher.fetch(&request).await.context("fetch Stargate routes")?;

    let route = select_route(&routes, config.preferred_route.as_deref())
        .ok_or(ExecError::NoRoute)
        .with_context(|| format!("{} candidate routes", routes.len()))?;
    info!(
        route = %route.name(),
        steps = route.steps.len(),
        dst_amount = ?route.dst_amount,
        estimated_secs = ?route.duration.as_ref().and_then(|d| d.estimated),
        "selected route"
    );

    let backend = build_backend(&config, &request.src_chain_key)?;
    info!(chain = %backend.chain(), family = %config.chain_family, "backend ready");

    let (cancel, signal) = cancel_pair();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received; no further steps will be submitted");
            cancel.cancel();
        }
    });

    let executor = RouteExecutor::new(config.confirmation_timeout());
    match executor.execute_with_cancel(route, &backend, &signal).await {
        Ok(results) => {
            for result in &results {
                info!(
                    step = result.step + 1,
                    submission = %result.submission_id,
                    status = ?result.status,
                    elapsed_ms = result.elapsed.as_millis() as u64,
                    "step result"
                );
            }
            info!("successfully executed Stargate transfer");
            Ok(())
        }
        Err(err) => {
            error!(
                step = ?err.step().map(|s| s + 1),
                submission = ?err.submission_id(),
                inconclusive = err.is_inconclusive(),
                "route execution stopped"
            );
            Err(err.into())
        }
    }
}

fn build_backend(config: &AppConfig, chain_key: &str) -> Result<Backend> {
    match config.chain_family {
        ChainFamily::Evm => {
            let signer = parse_evm_signer(config.secret_key.expose()).context("parse EVM key")?;
            Ok(Backend::Evm(EvmBackend::new(
                chain_key,
                config.rpc_endpoint.clone(),
                signer,
                config.confirmations(),
                config.poll_interval(),
            )))
        }
        ChainFamily::Solana => {
            let keypair =
                SolanaKeypair::parse(config.secret_key.expose()).context("parse Solana keypair")?;
            let rpc = JsonRpc::new(config.rpc_endpoint.to_string(), config.http_timeout())
                .context("initialize Solana RPC client")?;
            Ok(Backend::Solana(SolanaBackend::new(
                rpc,
                keypair,
                config.commitment(),
                config.poll_interval(),
            )))
        }
    }
}

fn init_tracing() -> Result<()> {
    let env_filter =
        std::env::var("RUST_LOG").unwrap_or_else(|_| "info,hyper=warn,reqwest=warn".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(env_filter))
        .with_target(false)
        .try_init()
        .map_err(|err| anyhow!("tracing subscriber init: {err}"))
}
