use std::env;
use std::time::Duration;

use campus_cli::init_tracing;
use campus_core::config::Config;
use campus_core::Error;
use campus_retrieval::RetrievalEngine;

fn usage() -> ! {
    eprintln!("Usage: campus-search <query> [--limit N] [--min-score S] [--timeout-ms T]");
    eprintln!("Example: campus-search 'When does the library open?' --limit 3");
    std::process::exit(1);
}

fn value<T: std::str::FromStr>(args: &[String], i: usize, flag: &str) -> T {
    match args.get(i + 1).map(|s| s.parse::<T>()) {
        Some(Ok(v)) => v,
        _ => { eprintln!("Error: {} requires a number", flag); usage() }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing("warn");
    let config = Config::load().map_err(|e| { eprintln!("Error loading config: {}", e); e })?;
    let settings = config.retrieval()?;

    let args: Vec<String> = env::args().skip(1).collect();
    let mut query = None;
    let mut limit = settings.default_top_k;
    let mut min_score = settings.min_score;
    let mut timeout = settings.query_timeout();
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--limit" | "-k" => { limit = value(&args, i, "--limit"); i += 1; }
            "--min-score" => { min_score = value(&args, i, "--min-score"); i += 1; }
            "--timeout-ms" => { timeout = Duration::from_millis(value(&args, i, "--timeout-ms")); i += 1; }
            "--help" | "-h" => usage(),
            arg if !arg.starts_with('-') && query.is_none() => query = Some(arg.to_string()),
            other => { eprintln!("Error: unexpected argument {}", other); usage() }
        }
        i += 1;
    }
    let Some(query) = query else { usage() };

    let engine = RetrievalEngine::from_settings(&settings)?;
    let Some(stats) = engine.stats() else {
        println!("⚠️  No usable index at {}. Run campus-indexer first.", settings.index_path().display());
        return Ok(());
    };
    println!("🔍 campus-search\n===============");
    println!("Query: {}", query);
    println!("Index: {} passages from {} sources ({} dims, {})", stats.passages, stats.sources, stats.dim, stats.strategy);

    let results = match engine.query_with_timeout(&query, limit, min_score, timeout).await {
        Ok(results) => results,
        Err(Error::Timeout(d)) => { eprintln!("⏱️  Query timed out after {:?}", d); std::process::exit(2); }
        Err(e) => return Err(e.into()),
    };
    if results.is_empty() {
        println!("\nNo passages scored at least {:.2}.", min_score);
        return Ok(());
    }
    println!("\nFound {} results:", results.len());
    for (rank, hit) in results.iter().enumerate() {
        println!("\n  {}. score={:.4}  source={}  chunk={}", rank + 1, hit.score, hit.passage.source_id, hit.passage.chunk_index);
        println!("     📝 {}", hit.passage.text);
    }
    Ok(())
}
