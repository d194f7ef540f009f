use std::env;
use std::path::PathBuf;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

use campus_cli::{init_tracing, load_documents};
use campus_core::config::Config;
use campus_embed::embedder_from_settings;
use campus_retrieval::{EngineOptions, RetrievalEngine};

fn usage() -> ! {
    eprintln!("Usage: campus-indexer [data_dir] [--index <snapshot path>]");
    std::process::exit(1);
}

fn main() -> anyhow::Result<()> {
    init_tracing("info");
    let config = Config::load().map_err(|e| { eprintln!("Error loading config: {}", e); e })?;
    let mut settings = config.retrieval()?;

    let args: Vec<String> = env::args().skip(1).collect();
    let mut data_dir = None;
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--index" => match args.get(i + 1) {
                Some(path) => { settings.index_path = path.clone(); i += 1; }
                None => { eprintln!("Error: --index requires a path"); usage() }
            },
            "--help" | "-h" => usage(),
            arg if !arg.starts_with('-') => data_dir = Some(PathBuf::from(arg)),
            other => { eprintln!("Error: unknown option {}", other); usage() }
        }
        i += 1;
    }
    let data_dir = data_dir.unwrap_or_else(|| {
        let dir: String = config.get("data.raw_dir").unwrap_or_else(|_| "./datasets".to_string());
        PathBuf::from(dir)
    });

    println!("Campus Indexer\n==============");
    println!("Data directory: {}", data_dir.display());
    println!("Snapshot: {}", settings.index_path().display());

    let documents = load_documents(&data_dir)?;
    if documents.is_empty() {
        println!("⚠️  No documents found; writing an empty index");
    } else {
        println!("📄 Loaded {} documents", documents.len());
    }

    let embedder = embedder_from_settings(&settings)?;
    println!("🧠 Embedding model: {} ({} dims)", embedder.model_id(), embedder.dim());
    let engine = RetrievalEngine::new(embedder, EngineOptions::from_settings(&settings));

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::with_template("{spinner} {msg} [{elapsed}]")?);
    spinner.set_message("Building index");
    spinner.enable_steady_tick(Duration::from_millis(120));
    let result = engine.build_index(&documents);
    spinner.finish_and_clear();
    let report = result?;

    println!("\n✅ Indexing completed in {:.2?}", report.elapsed);
    println!("📊 {} documents -> {} passages ({} dims)", report.documents, report.passages, report.dim);
    println!("\n💡 To search, use: cargo run --bin campus-search '<query>'");
    Ok(())
}
