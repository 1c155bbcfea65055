use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use colored::Colorize;
use foa_crypto::ComposedEntry;
use foa_network::InMemoryNetwork;
use foa_server::FoaServer;
use foa_store::{InMemoryStore, ObjectStore};
use foa_sync::SyncEngine;
use foa_types::{ChainId, Content, EntryHash, ExtId};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::cli::*;
use crate::config::FoaConfig;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Serve(args) => cmd_serve(args, cli.verbose),
        Command::ChainId(args) => {
            init_tracing("warn", cli.verbose);
            cmd_chain_id(args)
        }
        Command::EntryHash(args) => {
            init_tracing("warn", cli.verbose);
            cmd_entry_hash(args)
        }
        Command::Config => cmd_config(),
    }
}

/// `RUST_LOG` wins over `level`; `--verbose` raises the default to debug.
fn init_tracing(level: &str, verbose: bool) {
    let default = if verbose { "debug" } else { level };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

fn cmd_serve(args: ServeArgs, verbose: bool) -> anyhow::Result<()> {
    let mut config = match &args.config {
        Some(path) => FoaConfig::load(path)?,
        None => FoaConfig::default(),
    };
    if let Some(bind) = args.bind {
        config.server.bind_addr = bind;
    }
    init_tracing(&config.log.level, verbose);

    let runtime = tokio::runtime::Runtime::new().context("cannot start the tokio runtime")?;
    runtime.block_on(serve(config))
}

async fn serve(config: FoaConfig) -> anyhow::Result<()> {
    let store = Arc::new(InMemoryStore::new());
    for user in &config.users {
        store
            .insert_user(user.to_user())
            .with_context(|| format!("cannot register user '{}'", user.name))?;
    }
    if config.users.is_empty() {
        warn!("no users configured; every request will be rejected");
    }

    let network = Arc::new(InMemoryNetwork::new());
    let engine = Arc::new(SyncEngine::new(
        store,
        network.clone(),
        config.sync.to_sync_config(),
    )?);
    let mut tasks = engine.spawn_background();
    tasks.push(network.spawn_block_producer(
        Duration::from_secs(config.network.block_interval_secs),
        engine.shutdown_signal(),
    ));
    info!(
        users = config.users.len(),
        block_interval_secs = config.network.block_interval_secs,
        "sync engine started"
    );

    println!(
        "{} FOA gateway on {}",
        "✓".green().bold(),
        config.server.bind_addr.to_string().bold()
    );
    let server = FoaServer::new(config.server.clone(), Arc::clone(&engine));
    let result = server
        .serve(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!(error = %err, "cannot listen for ctrl-c");
            }
        })
        .await;

    engine.shutdown();
    for task in tasks {
        let _ = task.await;
    }
    result?;
    Ok(())
}

fn cmd_chain_id(args: ChainIdArgs) -> anyhow::Result<()> {
    let chain_id = compute_chain_id(&args)?;
    println!("{}", chain_id.to_string().yellow());
    Ok(())
}

fn compute_chain_id(args: &ChainIdArgs) -> anyhow::Result<ChainId> {
    let ext_ids = args
        .ext_ids
        .iter()
        .map(|raw| decode(raw, args.base64).map(ExtId::new))
        .collect::<anyhow::Result<Vec<_>>>()?;
    Ok(foa_crypto::chain_id(&ext_ids))
}

fn cmd_entry_hash(args: EntryHashArgs) -> anyhow::Result<()> {
    let (hash, size) = compute_entry_hash(&args)?;
    println!("{}", hash.to_string().yellow());
    println!("  size: {} bytes", size.to_string().bold());
    Ok(())
}

fn compute_entry_hash(args: &EntryHashArgs) -> anyhow::Result<(EntryHash, usize)> {
    let chain_id = ChainId::from_hex(&args.chain).context("invalid chain id")?;
    let ext_ids = args
        .ext_ids
        .iter()
        .map(|raw| decode(raw, args.base64).map(ExtId::new))
        .collect::<anyhow::Result<Vec<_>>>()?;
    let content = Content::new(decode(&args.content, args.base64)?);
    let entry = ComposedEntry::compose(chain_id, ext_ids, content)?;
    Ok((entry.entry_hash, entry.size()))
}

/// Command-line payloads are UTF-8 text unless `--base64` is given.
fn decode(raw: &str, base64: bool) -> anyhow::Result<Vec<u8>> {
    if base64 {
        let bytes = Content::from_base64(raw)
            .with_context(|| format!("'{raw}' is not valid base64"))?;
        Ok(bytes.into_inner())
    } else {
        Ok(raw.as_bytes().to_vec())
    }
}

fn cmd_config() -> anyhow::Result<()> {
    print!("{}", FoaConfig::default().to_toml()?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_id_matches_crypto() {
        let args = ChainIdArgs {
            ext_ids: vec!["a".into(), "b".into()],
            base64: false,
        };
        let expected = foa_crypto::chain_id(&[ExtId::from("a"), ExtId::from("b")]);
        assert_eq!(compute_chain_id(&args).unwrap(), expected);

        let encoded = ChainIdArgs {
            ext_ids: vec!["YQ==".into(), "Yg==".into()],
            base64: true,
        };
        assert_eq!(compute_chain_id(&encoded).unwrap(), expected);
    }

    #[test]
    fn entry_hash_matches_crypto() {
        let chain_id = foa_crypto::chain_id(&[ExtId::from("c")]);
        let args = EntryHashArgs {
            chain: chain_id.to_hex(),
            ext_ids: vec!["x".into()],
            content: "hello".into(),
            base64: false,
        };
        let (hash, size) = compute_entry_hash(&args).unwrap();
        let expected =
            foa_crypto::entry_hash(&chain_id, &[ExtId::from("x")], &Content::from("hello")).unwrap();
        assert_eq!(hash, expected);
        assert_eq!(size, foa_crypto::ENTRY_HEADER_SIZE + 2 + 1 + 5);
    }

    #[test]
    fn bad_inputs_fail() {
        let args = EntryHashArgs {
            chain: "zz".into(),
            ext_ids: vec![],
            content: String::new(),
            base64: false,
        };
        assert!(compute_entry_hash(&args).is_err());

        let args = ChainIdArgs {
            ext_ids: vec!["***".into()],
            base64: true,
        };
        assert!(compute_chain_id(&args).is_err());
    }

    #[test]
    fn default_config_renders() {
        let rendered = FoaConfig::default().to_toml().unwrap();
        assert!(rendered.contains("[server]"));
        assert!(rendered.contains("block_interval_secs = 10"));
    }
}
