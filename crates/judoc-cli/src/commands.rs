use std::path::Path;

use anyhow::Context;
use colored::Colorize;
use judoc_client::Client;
use judoc_server::{JudocServer, ServerConfig, TlsConfig};
use tokio::io::AsyncRead;

use crate::cli::*;

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Serve(args) => cmd_serve(args).await,
        Command::Put(args) => cmd_put(&cli.url, args).await,
        Command::Get(args) => cmd_get(&cli.url, args).await,
        Command::Rm(args) => cmd_rm(&cli.url, args).await,
    }
}

async fn cmd_serve(args: ServeArgs) -> anyhow::Result<()> {
    let mut config = match &args.config {
        Some(path) => ServerConfig::load(path)?,
        None => ServerConfig::default(),
    };
    args.apply(&mut config);

    let server = JudocServer::new(config).await?;
    let config = server.config();
    eprintln!(
        "{} judoc on {} ({} backend, {} layout, {} byte blocks)",
        "✓".green().bold(),
        config.bind_addr.to_string().bold(),
        config.backend.to_string().cyan(),
        config.strategy.to_string().cyan(),
        config.block_size,
    );
    server.serve().await?;
    Ok(())
}

async fn cmd_put(url: &str, args: PutArgs) -> anyhow::Result<()> {
    let client = Client::new(url)?;
    let input = open_input(args.file.as_deref()).await?;
    client.set_reader(&args.namespace, &args.key, input).await?;
    eprintln!("{} Stored {}", "✓".green().bold(), object_name(&args.namespace, &args.key).yellow());
    Ok(())
}

async fn cmd_get(url: &str, args: GetArgs) -> anyhow::Result<()> {
    let client = Client::new(url)?;
    let written = match &args.output {
        Some(path) => {
            let mut file = tokio::fs::File::create(path)
                .await
                .with_context(|| format!("creating {}", path.display()))?;
            client.download(&args.namespace, &args.key, &mut file).await?
        }
        None => {
            let mut stdout = tokio::io::stdout();
            client.download(&args.namespace, &args.key, &mut stdout).await?
        }
    };
    tracing::debug!(key = %object_name(&args.namespace, &args.key), bytes = written, "downloaded");
    Ok(())
}

async fn cmd_rm(url: &str, args: RmArgs) -> anyhow::Result<()> {
    let client = Client::new(url)?;
    client.delete(&args.namespace, &args.key).await?;
    eprintln!("{} Removed {}", "✓".green().bold(), object_name(&args.namespace, &args.key).yellow());
    Ok(())
}

type Input = Box<dyn AsyncRead + Send + Sync + Unpin>;

/// The upload source: `path` if given, stdin otherwise.
async fn open_input(path: Option<&Path>) -> anyhow::Result<Input> {
    match path {
        Some(path) => {
            let file = tokio::fs::File::open(path)
                .await
                .with_context(|| format!("opening {}", path.display()))?;
            Ok(Box::new(file))
        }
        None => Ok(Box::new(tokio::io::stdin())),
    }
}

fn object_name(namespace: &str, key: &str) -> String {
    if namespace.is_empty() {
        key.to_string()
    } else {
        format!("{namespace}/{key}")
    }
}

impl ServeArgs {
    /// Overlay the flags that were given on top of `config`.
    pub fn apply(&self, config: &mut ServerConfig) {
        if let Some(bind) = self.bind {
            config.bind_addr = bind;
        }
        if let Some(backend) = self.backend {
            config.backend = backend;
        }
        if !self.cluster.is_empty() {
            config.cluster = self
                .cluster
                .iter()
                .map(|node| node.trim().to_string())
                .filter(|node| !node.is_empty())
                .collect();
        }
        if let Some(keyspace) = &self.keyspace {
            config.keyspace = keyspace.clone();
        }
        if let Some(block_size) = self.block_size {
            config.block_size = block_size;
        }
        if let Some(consistency) = self.consistency {
            config.consistency = consistency;
        }
        if let Some(strategy) = self.strategy {
            config.strategy = strategy;
        }
        if let Some(page_size) = self.scan_page_size {
            config.scan_page_size = page_size;
        }
        if let Some(secs) = self.timeout_secs {
            config.request_timeout_secs = secs;
        }
        if self.capath.is_some() || self.certpath.is_some() || self.keypath.is_some() {
            let tls = config.tls.get_or_insert_with(TlsConfig::default);
            if let Some(path) = &self.capath {
                tls.ca_path = Some(path.clone());
            }
            if let Some(path) = &self.certpath {
                tls.cert_path = Some(path.clone());
            }
            if let Some(path) = &self.keypath {
                tls.key_path = Some(path.clone());
            }
        }
    }
}
