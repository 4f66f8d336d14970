use crate::client::ElasticClient;
use crate::config::{self, expand_tilde};
use crate::restore::Restorer;
use clap::Args;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Args)]
pub struct RestoreArgs {
    /// Dump directory produced by `esdump dump`
    #[arg(long, short)]
    pub input: PathBuf,

    /// Index to create and fill (must not exist)
    #[arg(long)]
    pub index: String,

    /// Split stored batches into bulk requests of at most this many documents
    #[arg(long)]
    pub batch_size: Option<usize>,
}

pub async fn run(config_path: Option<&Path>, args: RestoreArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = config::load_or_default(config_path)?;

    let client = ElasticClient::new(&config.cluster, config.scroll.keep_alive)?;
    let mut restorer = Restorer::new(Arc::new(client));

    let summary = restorer
        .restore(&expand_tilde(&args.input), &args.index, args.batch_size)
        .await?;
    println!(
        "Restored {} documents from {} batch files into {}",
        summary.documents, summary.batches, summary.index
    );
    Ok(())
}
