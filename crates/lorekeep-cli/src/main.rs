mod config;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use config::{LorekeepConfig, DEFAULT_CONFIG_FILE};
use lorekeep_core::{Fragment, Scope, DEFAULT_SOURCE};
use lorekeep_memory::{
    find_similar, DualStore, FragmentStore, MergeOptions, SearchResult, StoreStats,
};
use lorekeep_retrieval::{detect_context_tags, format_results, FormatStyle, KnowledgeRetriever};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "lorekeep", about = "lorekeep: shared and personal knowledge for coding sessions")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Knowledge-base root (overrides config and `.claude` discovery)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Store a new fragment
    Add {
        /// Fragment text
        content: String,
        /// Comma-separated tags
        #[arg(short, long, value_delimiter = ',')]
        tags: Vec<String>,
        /// Target scope: shared or personal
        #[arg(short, long, default_value = "shared")]
        scope: Scope,
        /// Free-form origin label
        #[arg(long, default_value = DEFAULT_SOURCE)]
        source: String,
        /// Explicit id instead of a generated one
        #[arg(long)]
        id: Option<String>,
        /// Skip storing when a similar fragment already exists in the scope
        #[arg(long)]
        dedup: bool,
    },
    /// Print a fragment as JSON
    Get { id: String },
    /// Delete a fragment from whichever scope holds it
    Delete { id: String },
    /// List stored fragments
    List {
        /// Only this scope
        #[arg(short, long)]
        scope: Option<Scope>,
        #[arg(long)]
        json: bool,
    },
    /// Raw TF-IDF search across both scopes
    Search {
        query: String,
        #[arg(short = 'k', long)]
        top_k: Option<usize>,
        #[arg(long)]
        json: bool,
    },
    /// Context-aware retrieval for a prompt
    Retrieve {
        prompt: String,
        #[arg(short = 'k', long)]
        top_k: Option<usize>,
        #[arg(long)]
        min_score: Option<f64>,
        /// Exclude personal fragments
        #[arg(long)]
        no_personal: bool,
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Context)]
        format: OutputFormat,
        /// Record an access on every returned fragment
        #[arg(long)]
        mark: bool,
    },
    /// Move a personal fragment to the shared scope
    Promote { id: String },
    /// Rebuild indexes from the stored fragments
    Rebuild {
        /// Only this scope
        #[arg(short, long)]
        scope: Option<Scope>,
    },
    /// Show store statistics
    Stats {
        #[arg(long)]
        json: bool,
    },
    /// Show the context tags detected for a prompt
    Tags { prompt: String },
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Context,
    List,
    Json,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .json()
        .init();

    let cli = Cli::parse();

    if let Commands::Tags { prompt } = &cli.command {
        let tags = detect_context_tags(prompt);
        if tags.is_empty() {
            println!("No context tags detected.");
        } else {
            println!("{}", tags.join(", "));
        }
        return Ok(());
    }

    let config = LorekeepConfig::load(&cli.config).await?;
    let cwd = std::env::current_dir()?;
    let paths = config.store_paths(cli.data_dir, &cwd);
    info!(
        shared = %paths.shared_dir.display(),
        personal = %paths.personal_dir.display(),
        "Opening knowledge stores"
    );
    let store = Arc::new(DualStore::open(paths.shared_dir, paths.personal_dir).await?);

    match cli.command {
        Commands::Add {
            content,
            tags,
            scope,
            source,
            id,
            dedup,
        } => {
            if dedup {
                let existing = find_similar(
                    store.store_for(scope),
                    &content,
                    config.retrieval.dedup_threshold,
                )
                .await?;
                if let Some(existing) = existing {
                    println!("Similar fragment already exists: {}", existing.id);
                    return Ok(());
                }
            }
            let mut fragment = Fragment::new(content, scope)
                .with_tags(tags)
                .with_source(source);
            if let Some(id) = id {
                fragment = fragment.with_id(id);
            }
            let id = store.add(fragment).await?;
            println!("{id}");
        }
        Commands::Get { id } => match store.get(&id).await? {
            Some(fragment) => println!("{}", serde_json::to_string_pretty(&fragment)?),
            None => anyhow::bail!("No fragment with id '{id}'"),
        },
        Commands::Delete { id } => {
            if !store.delete(&id).await? {
                anyhow::bail!("No fragment with id '{id}'");
            }
            println!("Deleted {id}");
        }
        Commands::List { scope, json } => {
            let mut fragments = Vec::new();
            for s in [Scope::Shared, Scope::Personal] {
                if scope.map_or(true, |wanted| wanted == s) {
                    fragments.extend(store.store_for(s).list_all().await?);
                }
            }
            if json {
                println!("{}", serde_json::to_string_pretty(&fragments)?);
            } else if fragments.is_empty() {
                println!("No fragments stored.");
            } else {
                for f in &fragments {
                    let tags = if f.tags.is_empty() {
                        String::new()
                    } else {
                        format!(" [{}]", f.tags.join(", "))
                    };
                    println!("{} ({}){tags}  {}", f.id, f.scope, one_line(&f.content));
                }
                println!("\nTotal: {} fragment(s)", fragments.len());
            }
        }
        Commands::Search { query, top_k, json } => {
            let top_k = top_k.unwrap_or(config.retrieval.top_k);
            let results = store
                .search(&query, top_k, &MergeOptions::default())
                .await?;
            print_results(&results, json)?;
        }
        Commands::Retrieve {
            prompt,
            top_k,
            min_score,
            no_personal,
            format,
            mark,
        } => {
            let mut options = config.retrieval.retrieve_options();
            if let Some(top_k) = top_k {
                options.top_k = top_k;
            }
            if let Some(min_score) = min_score {
                options.min_score = min_score;
            }
            if no_personal {
                options.include_personal = false;
            }

            let retriever = KnowledgeRetriever::new(store.clone());
            let results = retriever.retrieve(&prompt, &options).await?;
            let rendered = match format {
                OutputFormat::Json => serde_json::to_string_pretty(&results)?,
                OutputFormat::Context => format_results(&results, FormatStyle::Context),
                OutputFormat::List => format_results(&results, FormatStyle::List),
            };
            if !rendered.is_empty() {
                println!("{rendered}");
            }

            if mark && !results.is_empty() {
                let mut fragments: Vec<Fragment> =
                    results.into_iter().map(|r| r.fragment).collect();
                let updated = retriever.mark_retrieved(&mut fragments).await;
                info!(updated, "Recorded fragment access");
            }
        }
        Commands::Promote { id } => {
            if !store.promote(&id).await? {
                anyhow::bail!("No personal fragment with id '{id}'");
            }
            println!("Promoted {id} to shared");
        }
        Commands::Rebuild { scope } => match scope {
            Some(scope) => {
                let count = store.store_for(scope).rebuild_index().await?;
                println!("Rebuilt {scope} index: {count} fragment(s)");
            }
            None => {
                let (shared, personal) = store.rebuild_all().await?;
                println!("Rebuilt indexes: {shared} shared, {personal} personal");
            }
        },
        Commands::Stats { json } => {
            let stats = store.all_stats().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                print_store_stats(&stats.shared);
                print_store_stats(&stats.personal);
                println!(
                    "Total: {} fragment(s), {} term(s)",
                    stats.combined.total_fragments, stats.combined.total_terms
                );
            }
        }
        Commands::Tags { .. } => {}
    }

    Ok(())
}

fn print_results(results: &[SearchResult], json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(results)?);
        return Ok(());
    }
    if results.is_empty() {
        println!("No matches.");
        return Ok(());
    }
    for r in results {
        println!(
            "{:.3}  {} ({})  {}",
            r.score,
            r.fragment.id,
            r.fragment.scope,
            one_line(&r.fragment.content)
        );
    }
    Ok(())
}

fn print_store_stats(stats: &StoreStats) {
    println!("{}:", stats.scope);
    println!("  Fragments: {}", stats.total_fragments);
    println!("  Terms:     {}", stats.total_terms);
    println!("  Accesses:  {}", stats.total_accesses);
    if !stats.tag_counts.is_empty() {
        let tags: Vec<String> = stats
            .tag_counts
            .iter()
            .map(|(tag, n)| format!("{tag} ({n})"))
            .collect();
        println!("  Tags:      {}", tags.join(", "));
    }
    if !stats.source_counts.is_empty() {
        let sources: Vec<String> = stats
            .source_counts
            .iter()
            .map(|(source, n)| format!("{source} ({n})"))
            .collect();
        println!("  Sources:   {}", sources.join(", "));
    }
}

fn one_line(content: &str) -> String {
    const MAX: usize = 80;
    let flat = content.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() > MAX {
        let head: String = flat.chars().take(MAX).collect();
        format!("{head}...")
    } else {
        flat
    }
}
