use crate::client::ElasticClient;
use crate::config::{self, expand_tilde};
use crate::document::FieldMode;
use crate::dump::{DumpRequest, Dumper};
use clap::Args;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Args)]
pub struct DumpArgs {
    /// Index to read from
    #[arg(long)]
    pub index: String,

    /// Dump directory (created if missing)
    #[arg(long, short)]
    pub output: PathBuf,

    /// Search body as inline JSON (default: match_all)
    #[arg(long, conflicts_with = "query_file")]
    pub query: Option<String>,

    /// Read the search body from a JSON file
    #[arg(long)]
    pub query_file: Option<PathBuf>,

    /// Documents per batch file (default from config)
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Keep hit metadata (_index, _routing, ...) alongside the source
    #[arg(long)]
    pub raw: bool,

    /// Replace an existing dump in the output directory
    #[arg(long)]
    pub overwrite: bool,
}

pub async fn run(config_path: Option<&Path>, args: DumpArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = config::load_or_default(config_path)?;
    let query = resolve_query(args.query.as_deref(), args.query_file.as_deref())?;

    let client = ElasticClient::new(&config.cluster, config.scroll.keep_alive)?;
    let mut dumper = Dumper::new(Arc::new(client), &config.scroll);

    let request = DumpRequest {
        index: args.index,
        query,
        destination: expand_tilde(&args.output),
        batch_size: args.batch_size.unwrap_or(config.dump.batch_size),
        mode: if args.raw { FieldMode::Raw } else { FieldMode::Source },
        overwrite: args.overwrite,
    };

    let summary = dumper.dump(&request).await?;
    println!(
        "Dumped {} documents in {} batch files to {}",
        summary.documents,
        summary.batches,
        summary.destination.display()
    );
    Ok(())
}

fn resolve_query(inline: Option<&str>, file: Option<&Path>) -> Result<Value, Box<dyn std::error::Error>> {
    let text = match (inline, file) {
        (Some(q), _) => q.to_string(),
        (None, Some(path)) => {
            let path = expand_tilde(path);
            fs::read_to_string(&path)
                .map_err(|e| format!("failed to read query file '{}': {}", path.display(), e))?
        }
        (None, None) => return Ok(DumpRequest::match_all()),
    };

    let query: Value =
        serde_json::from_str(&text).map_err(|e| format!("query is not valid JSON: {}", e))?;
    if !query.is_object() {
        return Err("query must be a JSON object".into());
    }
    Ok(query)
}
