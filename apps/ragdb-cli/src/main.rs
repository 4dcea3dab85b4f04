use std::env;
use std::path::PathBuf;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;

use ragdb_core::chunker::Chunker;
use ragdb_core::config::Config;
use ragdb_pipeline::{Backend, Pipeline, Retrieval};

const USAGE: &str = "Usage: ragdb ingest [dir] [--limit N]\n       ragdb query \"<text>\" [--k N]";

fn parse_args() -> (String, Vec<String>) {
    let mut args: Vec<String> = env::args().skip(1).collect();
    if args.is_empty() { eprintln!("{USAGE}"); std::process::exit(1); }
    let cmd = args.remove(0);
    (cmd, args)
}

/// Splits `args` into positionals and the value of `flag`, if given.
fn take_flag(args: &[String], flag: &str) -> anyhow::Result<(Vec<String>, Option<usize>)> {
    let mut rest = Vec::new();
    let mut value = None;
    let mut i = 0;
    while i < args.len() {
        if args[i] == flag {
            let raw = args.get(i + 1).ok_or_else(|| anyhow::anyhow!("{flag} requires a number"))?;
            value = Some(raw.parse::<usize>().map_err(|_| anyhow::anyhow!("{flag} requires a number, got '{raw}'"))?);
            i += 2;
            continue;
        }
        rest.push(args[i].clone());
        i += 1;
    }
    Ok((rest, value))
}

fn spinner(msg: String) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}") {
        pb.set_style(style);
    }
    pb.enable_steady_tick(Duration::from_millis(120));
    pb.set_message(msg);
    pb
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("ragdb=info")))
        .with_writer(std::io::stderr)
        .init();

    let config = Config::load().map_err(|e| { eprintln!("Error loading config: {e}"); e })?;
    let rag = config.rag()?;
    let (cmd, args) = parse_args();

    match cmd.as_str() {
        "ingest" => {
            let (positional, limit) = take_flag(&args, "--limit")?;
            let data_dir = positional.first().map(PathBuf::from).unwrap_or_else(|| {
                let dir: String = config.get("data.raw_txt_dir").unwrap_or_else(|_| "data/txt".to_string());
                PathBuf::from(dir)
            });
            let pipeline = Pipeline::new(Backend::from_config(&rag)?, Chunker::new(rag.chunking.clone()));
            let pb = spinner(format!("Ingesting {}", data_dir.display()));
            let report = pipeline.ingest_dir(&data_dir, limit).await;
            pb.finish_and_clear();
            let report = report?;
            println!(
                "Ingested {} documents: {} chunks, {} stored, {} skipped",
                report.documents, report.chunks, report.stored, report.skipped
            );
        }
        "query" => {
            let (positional, k) = take_flag(&args, "--k")?;
            let Some(query) = positional.first() else { eprintln!("{USAGE}"); std::process::exit(1) };
            let k = k.unwrap_or(rag.retrieval.top_k);
            let retriever = Pipeline::new(Backend::from_config(&rag)?, Chunker::new(rag.chunking.clone())).retriever();
            match retriever.top_k(query, k).await {
                Retrieval::Found(hits) => {
                    for (rank, hit) in hits.iter().enumerate() {
                        println!("{}. [{}] (distance {:.4})\n{}\n", rank + 1, hit.id, hit.distance, hit.text);
                    }
                }
                Retrieval::NoMatches => println!("No relevant content found"),
                Retrieval::Failed(e) => {
                    println!("No relevant content found");
                    eprintln!("retrieval failed: {e}");
                }
            }
        }
        _ => { eprintln!("Unknown command: {cmd}\n{USAGE}"); std::process::exit(1); }
    }
    Ok(())
}
