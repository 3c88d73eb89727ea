use anyhow::{anyhow, Context, Result};
use catalog_client::EnrichmentFetcher;
use clap::{Parser, Subcommand};
use colored::Colorize;
use domain::{Book, Outcome, QueryRequest, SearchResponse};
use server::{BookSearchOrchestrator, Config};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::Semaphore;
use tracing::warn;

/// ShelfRecs - Conversational Book Recommendations
#[derive(Parser)]
#[command(name = "shelf-recs")]
#[command(about = "Book recommendations from a chat model, enriched with Open Library data", long_about = None)]
struct Cli {
    /// Path to a TOML config file (defaults are used when absent)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask for book recommendations once
    Search {
        /// Conversation session to continue
        #[arg(long, default_value = "cli")]
        session_id: String,

        /// What to search for
        #[arg(long)]
        query: String,

        /// Print the raw JSON response
        #[arg(long)]
        json: bool,
    },

    /// Interactive conversation on one session
    Chat {
        /// Conversation session to use (random when omitted)
        #[arg(long)]
        session_id: Option<String>,
    },

    /// Look up catalog metadata for ISBNs
    Enrich {
        /// ISBNs to look up
        #[arg(required = true)]
        isbns: Vec<String>,
    },

    /// Run benchmark to test performance
    Benchmark {
        /// Number of requests to make
        #[arg(long, default_value = "20")]
        requests: usize,

        /// Number of concurrent requests
        #[arg(long, default_value = "5")]
        concurrent: usize,

        /// Query sent by every request
        #[arg(long, default_value = "Classic science fiction novels")]
        query: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::load_or_default(cli.config.as_deref()).context("Failed to load config")?;

    match cli.command {
        Commands::Search {
            session_id,
            query,
            json,
        } => handle_search(&config, session_id, query, json).await?,
        Commands::Chat { session_id } => handle_chat(&config, session_id).await?,
        Commands::Enrich { isbns } => handle_enrich(&config, isbns).await?,
        Commands::Benchmark {
            requests,
            concurrent,
            query,
        } => handle_benchmark(&config, requests, concurrent, query).await?,
    }

    Ok(())
}

/// Handle the 'search' command
async fn handle_search(config: &Config, session_id: String, query: String, json: bool) -> Result<()> {
    let orchestrator = BookSearchOrchestrator::from_config(config)?;

    let start = Instant::now();
    let response = orchestrator.search(QueryRequest::new(session_id, query)).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&response)?);
    } else {
        print_response(&response);
        println!("{}", format!("({:.2?})", start.elapsed()).dimmed());
    }
    Ok(())
}

/// Handle the 'chat' command
async fn handle_chat(config: &Config, session_id: Option<String>) -> Result<()> {
    let orchestrator = BookSearchOrchestrator::from_config(config)?;
    let session_id = session_id.unwrap_or_else(random_session_id);

    println!("{}", format!("Session {}", session_id).bold().blue());
    println!("{}", "What would you like to read? (empty line or 'exit' to quit)".dimmed());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("{} ", ">".green().bold());
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let query = line.trim();
        if query.is_empty() || query.eq_ignore_ascii_case("exit") {
            break;
        }

        let response = orchestrator
            .search(QueryRequest::new(session_id.clone(), query))
            .await;
        print_response(&response);
        println!();
    }
    Ok(())
}

/// Handle the 'enrich' command
async fn handle_enrich(config: &Config, isbns: Vec<String>) -> Result<()> {
    let fetcher = EnrichmentFetcher::open_library(
        config.enrichment.catalog_endpoint.clone(),
        config.enrichment.fetch_config(),
    )?;

    let start = Instant::now();
    let outcomes = fetcher.fetch(&isbns).await;
    println!(
        "{} Fetched {} keys in {:.2?}",
        "✓".green(),
        outcomes.len(),
        start.elapsed()
    );

    for isbn in &isbns {
        let key = isbn.trim();
        match outcomes.get(key) {
            Some(Outcome::Success(details)) => {
                println!("{} {}", "•".green(), key.bold());
                println!(
                    "    rating {} ({} ratings), {} pages, first published {}",
                    or_dash(&details.ratings_average),
                    or_dash(&details.ratings_count),
                    or_dash(&details.number_of_pages_median),
                    or_dash(&details.first_publish_year)
                );
                println!(
                    "    stars 1-5: {} / {} / {} / {} / {}",
                    or_dash(&details.ratings_count_1),
                    or_dash(&details.ratings_count_2),
                    or_dash(&details.ratings_count_3),
                    or_dash(&details.ratings_count_4),
                    or_dash(&details.ratings_count_5)
                );
            }
            Some(Outcome::Empty) => println!("{} {}: no catalog record", "•".yellow(), key),
            Some(Outcome::Failed) => println!("{} {}: lookup failed", "•".red(), key),
            None => println!("{} {:?}: skipped", "•".dimmed(), isbn),
        }
    }
    Ok(())
}

/// Handle the 'benchmark' command
async fn handle_benchmark(
    config: &Config,
    requests: usize,
    concurrent: usize,
    query: String,
) -> Result<()> {
    if requests == 0 {
        return Err(anyhow!("--requests must be at least 1"));
    }
    let orchestrator = BookSearchOrchestrator::from_config(config)?;
    let permits = Arc::new(Semaphore::new(concurrent.max(1)));

    println!(
        "Running {} requests ({} concurrent)...",
        requests,
        concurrent.max(1)
    );

    let start = Instant::now();
    let mut handles = vec![];
    for _ in 0..requests {
        let orchestrator = orchestrator.clone();
        let permits = permits.clone();
        let request = QueryRequest::new(random_session_id(), query.clone());
        handles.push(tokio::spawn(async move {
            let _permit = permits.acquire_owned().await?;
            let started = Instant::now();
            let response = orchestrator.search(request).await;
            Ok::<_, anyhow::Error>((started.elapsed(), response.kind()))
        }));
    }

    // Wait for all tasks to complete and collect timings
    let mut timings = vec![];
    let mut kinds: Vec<(&str, usize)> = vec![];
    for handle in handles {
        match handle.await? {
            Ok((elapsed, kind)) => {
                timings.push(elapsed);
                match kinds.iter_mut().find(|(k, _)| *k == kind) {
                    Some((_, count)) => *count += 1,
                    None => kinds.push((kind, 1)),
                }
            }
            Err(e) => warn!("Benchmark request failed: {}", e),
        }
    }
    let wall_time = start.elapsed();
    if timings.is_empty() {
        return Err(anyhow!("No benchmark request completed"));
    }

    timings.sort();
    let total: Duration = timings.iter().sum();
    let avg_latency = total / timings.len() as u32;
    let throughput = timings.len() as f64 / wall_time.as_secs_f64();

    println!("{}", "Benchmark results:".bold().blue());
    println!("Wall time: {:.2?}", wall_time);
    println!("Average latency: {:.2?}", avg_latency);
    println!("P50 latency: {:.2?}", percentile(&timings, 0.50));
    println!("P95 latency: {:.2?}", percentile(&timings, 0.95));
    println!("P99 latency: {:.2?}", percentile(&timings, 0.99));
    println!("Throughput: {:.2} requests/second", throughput);
    for (kind, count) in kinds {
        println!("  {}: {}", kind, count);
    }

    Ok(())
}

/// Nearest-rank percentile of sorted timings.
fn percentile(sorted: &[Duration], quantile: f64) -> Duration {
    let rank = (sorted.len() as f64 * quantile).ceil() as usize;
    sorted[rank.clamp(1, sorted.len()) - 1]
}

fn random_session_id() -> String {
    format!("session-{:08x}", rand::random::<u32>())
}

fn or_dash(value: &str) -> &str {
    if value.is_empty() {
        "-"
    } else {
        value
    }
}

/// Helper function to format and print a search response
fn print_response(response: &SearchResponse) {
    match response {
        SearchResponse::Books(with_books) => {
            print!("{}", "Book Recommendations:\n".bold().blue());
            if with_books.books.is_empty() {
                println!("{}", "(no catalog matches for the suggested books)".dimmed());
            }
            for (i, book) in with_books.books.iter().enumerate() {
                print_book(i + 1, book);
            }
            if let Some(further_chat) = &with_books.further_chat {
                println!("\n{}", further_chat.italic());
            }
        }
        SearchResponse::NoMatches(no_matches) => {
            println!("{} {}", "No matches:".yellow().bold(), no_matches.no_matches_found);
        }
        SearchResponse::Profanity(profanity) => {
            println!("{}", profanity.profanity_found.red());
        }
        SearchResponse::Message(message) => println!("{}", message.message),
    }
}

fn print_book(rank: usize, book: &Book) {
    println!(
        "{}. {} by {}",
        rank.to_string().green(),
        book.title.bold(),
        book.author_name
    );
    if let Some(details) = &book.details {
        println!(
            "   Rating: {} ({} ratings) - {} pages - first published {}",
            or_dash(&details.ratings_average),
            or_dash(&details.ratings_count),
            or_dash(&details.number_of_pages_median),
            or_dash(&details.first_publish_year)
        );
    }
    if !book.brief_description.is_empty() {
        println!("   {}", book.brief_description);
    }
}
