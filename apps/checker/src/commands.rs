use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;
use std::sync::Arc;

use actix_web::{App, HttpServer, web};
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uptime::ledger::{GatewayLedger, MemoryLedger, WalletSelector};
use uptime::probe::PingResponder;
use uptime::{
    ActorId, AddressProbe, CheckerIdentity, CheckerProfile, EngineHandle, LedgerReader, LedgerSubmitter,
    MonitorEngine, NodeInfoPayload, PeerId, Transaction,
};

use crate::cli::{LedgerArgs, NodeArgs, RunArgs};
use crate::config::Config;
use crate::error::AppError;
use crate::status;

/// Which registry a one-shot command writes to
#[derive(Debug, Clone, Copy)]
pub enum NodeKind {
    Member,
    Checker,
}

fn gateway(config: &Config) -> Result<GatewayLedger, AppError> {
    if config.ledger.actor_address.is_empty() {
        return Err(AppError::MissingSetting("ledger.actor_address"));
    }

    Ok(GatewayLedger::new(
        &config.ledger.endpoint,
        config.ledger.actor_address.clone(),
        WalletSelector::new(config.ledger.wallet_index),
    )?)
}

/// Address other checkers reach this one at
fn advertise_ip(config: &Config, bound: IpAddr) -> IpAddr {
    if let Some(ip) = config.checker.advertise_host {
        return ip;
    }
    if bound.is_unspecified() {
        warn!("Checker bound to {}, advertising 127.0.0.1; set checker.advertise_host", bound);
        return IpAddr::V4(Ipv4Addr::LOCALHOST);
    }
    bound
}

pub async fn run(args: RunArgs, mut config: Config, config_file: &Path) -> Result<(), AppError> {
    args.apply(&mut config);
    let actor_id = ActorId::new(config.checker.actor_id);

    let identity = CheckerIdentity::load_or_generate(&config.keypair_path(config_file))?;

    let bind_ip: IpAddr = config.checker.host.parse()?;
    let responder = PingResponder::bind(identity.keypair().clone(), bind_ip, config.checker.port).await?;
    let advertised = identity.advertised_address(advertise_ip(&config, bind_ip), responder.port());

    info!(
        actor = %actor_id,
        peer = %identity.peer_id(),
        address = %advertised,
        status_port = config.status.port,
        wallet_index = config.ledger.wallet_index,
        "Starting uptime checker"
    );

    let (reader, submitter): (Arc<dyn LedgerReader>, Arc<dyn LedgerSubmitter>) = if args.dev {
        warn!("Running against an in-process ledger, nothing is persisted");
        let ledger = MemoryLedger::new();
        (Arc::new(ledger.clone()), Arc::new(ledger.submitter(actor_id)))
    } else {
        let ledger = gateway(&config)?;
        (Arc::new(ledger.clone()), Arc::new(ledger))
    };

    let profile = CheckerProfile::new(actor_id, identity.peer_id(), vec![advertised]);
    let probe = AddressProbe::new(identity.keypair().clone());
    let engine = MonitorEngine::new(profile, reader, submitter, Arc::new(probe), config.engine_config());

    let responder_task = tokio::spawn(responder.run(engine.subscribe_stop()));

    let handle = match engine.start().await {
        Ok(handle) => handle,
        Err(e) => {
            engine.stop();
            let _ = responder_task.await;
            return Err(e.into());
        }
    };

    let status_addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), config.status.port);
    serve_status(handle, responder_task, status_addr).await?;

    info!("Uptime checker stopped");
    Ok(())
}

/// Serve the health table until shutdown, then stop the engine and the responder
async fn serve_status(
    handle: EngineHandle,
    responder_task: JoinHandle<()>,
    status_addr: SocketAddr,
) -> Result<(), AppError> {
    let health = web::Data::new(handle.engine().health());

    let served = match HttpServer::new(move || App::new().app_data(health.clone()).configure(status::routes))
        .bind(status_addr)
    {
        Ok(server) => {
            info!("Status endpoint listening on {}", status_addr);
            // Returns once the server received a shutdown signal
            server.run().await
        }
        Err(e) => Err(e),
    };

    handle.shutdown().await;
    let _ = responder_task.await;
    Ok(served?)
}

pub async fn upsert_node(kind: NodeKind, create: bool, args: NodeArgs, mut config: Config) -> Result<(), AppError> {
    args.ledger.apply(&mut config);
    let addresses = args.addresses()?;
    let payload = NodeInfoPayload { id: PeerId::new(args.peer_id), addresses };

    let transaction = match (kind, create) {
        (NodeKind::Member, true) => Transaction::NewMember(payload),
        (NodeKind::Member, false) => Transaction::EditMember(payload),
        (NodeKind::Checker, true) => Transaction::Register(payload),
        (NodeKind::Checker, false) => Transaction::EditChecker(payload),
    };

    submit(transaction, &config).await
}

pub async fn remove_node(kind: NodeKind, args: LedgerArgs, mut config: Config) -> Result<(), AppError> {
    args.apply(&mut config);

    let transaction = match kind {
        NodeKind::Member => Transaction::RemoveMember,
        NodeKind::Checker => Transaction::RemoveChecker,
    };

    submit(transaction, &config).await
}

async fn submit(transaction: Transaction, config: &Config) -> Result<(), AppError> {
    let ledger = gateway(config)?;
    let method = transaction.method();

    info!(
        %method,
        actor_address = %config.ledger.actor_address,
        wallet_index = config.ledger.wallet_index,
        "Submitting transaction"
    );
    ledger.submit(transaction).await?;
    info!(%method, "Transaction executed");

    Ok(())
}

pub fn version() {
    println!("uptime-checker {} (uptime {})", env!("CARGO_PKG_VERSION"), uptime::VERSION);
}
