use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use proofmark::anchor::{AlloyWallet, AnchorConfig};
use proofmark::chain::ChainClient;
use proofmark::config::ProofmarkConfig;
use proofmark::crypto::{chain_form_hex, to_chain_form, to_storage_form};
use proofmark::infra::{ProofStore, SqliteProofStore};
use proofmark::reconcile::{ChainCheck, ReconcileOptions, ReconciledProof, ReconciliationEngine};
use proofmark::registration::{RegistrationOptions, RegistrationOrchestrator, RegistrationOutcome};
use proofmark::telemetry::{init_telemetry, TelemetryConfig};
use proofmark::OwnerId;

const DEFAULT_DATABASE_URL: &str = "sqlite://proofmark.db?mode=rwc";

fn print_help() {
    eprintln!(
        "\
proofmark-admin

USAGE:
  proofmark-admin <command> [options]

COMMANDS:
  migrate                         Run database migrations
  canonicalize                    Print the storage and chain forms of a hash
  list                            List stored proofs for an owner
  show                            Show the stored proof for a hash
  register                        Register a stored proof hash on-chain
  reconcile                       Re-derive proof statuses from the chain

COMMON OPTIONS:
  --database-url <sqlite_url>     (defaults to env DATABASE_URL)

canonicalize / show / register OPTIONS:
  --hash <hex>                    (required) 64 hex chars, optional 0x prefix

list OPTIONS:
  --owner <uuid>                  (required)

register OPTIONS:
  --timeout-secs <n>              (defaults to env CONFIRMATION_TIMEOUT_SECS)

reconcile OPTIONS:
  --owner <uuid>                  reconcile every proof of an owner
  --hash <hex>                    reconcile a single proof
  --no-write-back                 report only; leave stored statuses as they are

ENV (chain):
  CHAIN_RPC_URL / CHAIN_ID / PROOF_REGISTRY_ADDRESS / WALLET_PRIVATE_KEY
"
    );
}

/// Parsed options shared by every command
#[derive(Debug, Default)]
struct Options {
    database_url: Option<String>,
    hash: Option<String>,
    owner: Option<OwnerId>,
    timeout_secs: Option<u64>,
    no_write_back: bool,
    help: bool,
}

fn parse_options(mut args: VecDeque<String>) -> anyhow::Result<Options> {
    let mut options = Options::default();
    while let Some(arg) = args.pop_front() {
        let mut value = |name: &str| {
            args.pop_front()
                .ok_or_else(|| anyhow::anyhow!("missing value for {name}"))
        };
        match arg.as_str() {
            "--database-url" => options.database_url = Some(value("--database-url")?),
            "--hash" => options.hash = Some(value("--hash")?),
            "--owner" => options.owner = Some(value("--owner")?.parse()?),
            "--timeout-secs" => options.timeout_secs = Some(value("--timeout-secs")?.parse()?),
            "--no-write-back" => options.no_write_back = true,
            "-h" | "--help" => options.help = true,
            other => anyhow::bail!("unexpected argument: {other}"),
        }
    }
    Ok(options)
}

fn database_url(database_url: Option<String>) -> String {
    database_url
        .or_else(|| std::env::var("DATABASE_URL").ok())
        .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string())
}

async fn open_store(database_url: &str) -> anyhow::Result<Arc<SqliteProofStore>> {
    let store = SqliteProofStore::from_path(database_url).await?;
    store.initialize().await?;
    Ok(Arc::new(store))
}

fn chain_client(config: &ProofmarkConfig) -> anyhow::Result<Arc<ChainClient<AlloyWallet>>> {
    let wallet = AlloyWallet::new(AnchorConfig::from(config))?;
    Ok(Arc::new(ChainClient::new(
        wallet,
        config.registry_address,
        config.network.clone(),
    )))
}

fn print_reconciled(proof: &ReconciledProof) {
    let chain = match &proof.chain {
        ChainCheck::Observed(state) if state.exists => format!("owner {}", state.owner),
        ChainCheck::Observed(_) => "not registered".to_string(),
        ChainCheck::Failed(reason) => format!("read failed: {reason}"),
        ChainCheck::Skipped(advisory) => format!("skipped: {advisory}"),
    };
    println!(
        "{}  {:<8} (stored {:<8})  {}",
        proof.record.hash,
        proof.status(),
        proof.stored_status,
        chain
    );
    if let Some(warning) = &proof.write_back_warning {
        println!("  warning: status not persisted: {warning}");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut args: VecDeque<String> = std::env::args().skip(1).collect();
    let Some(command) = args.pop_front() else {
        print_help();
        return Ok(());
    };

    if matches!(command.as_str(), "-h" | "--help" | "help") {
        print_help();
        return Ok(());
    }

    let options = parse_options(args)?;
    if options.help {
        print_help();
        return Ok(());
    }

    init_telemetry(&TelemetryConfig::from_env()).map_err(|e| anyhow::anyhow!(e.to_string()))?;

    match command.as_str() {
        "migrate" => {
            open_store(&database_url(options.database_url)).await?;
            println!("ok: migrations applied");
            Ok(())
        }
        "canonicalize" => {
            let raw = options
                .hash
                .ok_or_else(|| anyhow::anyhow!("--hash is required"))?;
            let storage = to_storage_form(&raw)?;
            let chain = to_chain_form(storage.as_str())?;
            println!("storage: {storage}");
            println!("chain:   {}", chain_form_hex(&chain));
            Ok(())
        }
        "list" => {
            let owner = options
                .owner
                .ok_or_else(|| anyhow::anyhow!("--owner is required"))?;
            let store = open_store(&database_url(options.database_url)).await?;
            let records = store.list_by_owner(&owner).await?;
            println!("{}", serde_json::to_string_pretty(&records)?);
            Ok(())
        }
        "show" => {
            let raw = options
                .hash
                .ok_or_else(|| anyhow::anyhow!("--hash is required"))?;
            let hash = to_storage_form(&raw)?;
            let store = open_store(&database_url(options.database_url)).await?;
            match store.find_by_hash(&hash).await? {
                Some(record) => println!("{}", serde_json::to_string_pretty(&record)?),
                None => anyhow::bail!("no stored proof for {hash}"),
            }
            Ok(())
        }
        "register" => {
            let raw = options
                .hash
                .ok_or_else(|| anyhow::anyhow!("--hash is required"))?;
            let hash = to_storage_form(&raw)?;
            let config = ProofmarkConfig::from_env()?;
            let store = open_store(&database_url(options.database_url)).await?;
            let timeout = options
                .timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(config.confirmation_timeout);

            let orchestrator = RegistrationOrchestrator::new(
                chain_client(&config)?,
                store,
                RegistrationOptions {
                    confirmation_timeout: timeout,
                },
            );

            match orchestrator.register(Some(hash.as_str())).await? {
                RegistrationOutcome::Confirmed(confirmed) => {
                    println!(
                        "ok: {} registered in tx {} (block {}, gas limit {})",
                        confirmed.hash,
                        chain_form_hex(&confirmed.tx_hash),
                        confirmed.block_number.unwrap_or(0),
                        confirmed.gas_limit
                    );
                    if let Some(warning) = confirmed.store_warning {
                        println!("warning: on-chain registration confirmed but not recorded: {warning}");
                    }
                }
                RegistrationOutcome::AlreadyRegistered { hash, owner } => {
                    println!("ok: {hash} already registered by {owner}");
                }
            }
            Ok(())
        }
        "reconcile" => {
            let config = ProofmarkConfig::from_env()?;
            let store = open_store(&database_url(options.database_url)).await?;
            let engine = ReconciliationEngine::new(
                chain_client(&config)?,
                store,
                ReconcileOptions {
                    write_back: !options.no_write_back,
                },
            );

            match (options.owner, options.hash) {
                (Some(owner), None) => {
                    let report = engine.reconcile_all(&owner).await?;
                    if let Some(advisory) = &report.advisory {
                        println!("advisory: {advisory}");
                    }
                    for proof in &report.proofs {
                        print_reconciled(proof);
                    }
                    println!("ok: {} proofs reconciled", report.proofs.len());
                }
                (None, Some(raw)) => {
                    let proof = engine.reconcile_one(&raw).await?;
                    print_reconciled(&proof);
                }
                _ => anyhow::bail!("reconcile needs exactly one of --owner or --hash"),
            }
            Ok(())
        }
        other => {
            print_help();
            anyhow::bail!("unknown command: {other}")
        }
    }
}
