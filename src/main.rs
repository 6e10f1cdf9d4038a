use clap::Parser;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use isbnres::cache::FileCache;
use isbnres::lookup::IsbnLookupMode;
use isbnres::pool::DEFAULT_POOL_SIZE;
use isbnres::report::Report;
use isbnres::{IsbnResolver, ResolverConfig};
use std::process::ExitCode;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "isbnres")]
#[command(version)]
#[command(about = "Resolve a book title to ISBNs using several bibliographic sources", long_about = None)]
struct Args {
    /// Book title to look up
    #[arg(required_unless_present = "clear_cache")]
    title: Option<String>,

    /// Lookup mode: any, both, google-only or openlibrary-only
    #[arg(long, short, default_value = "any")]
    mode: IsbnLookupMode,

    /// Google Books API key
    #[arg(long, env = "GOOGLE_BOOKS_API_KEY", hide_env_values = true)]
    google_api_key: Option<String>,

    /// Maximum number of provider calls in flight
    #[arg(long, default_value_t = DEFAULT_POOL_SIZE)]
    workers: usize,

    /// Disable caching of resolved ISBNs
    #[arg(long)]
    no_cache: bool,

    /// Remove every cached result and exit
    #[arg(long)]
    clear_cache: bool,

    /// Print the result as JSON
    #[arg(long)]
    json: bool,

    /// Verbose output
    #[arg(long, short)]
    verbose: bool,
}

/// The title exactly as given, unless it is missing or blank
fn searchable_title(title: Option<&str>) -> Option<&str> {
    title.filter(|t| !t.trim().is_empty())
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    // Initialize logging
    if args.verbose {
        tracing_subscriber::fmt()
            .with_env_filter("isbnres=debug")
            .with_writer(std::io::stderr)
            .init();
    }

    if args.clear_cache {
        let result = match FileCache::new(true) {
            Ok(cache) => cache.clear().await,
            Err(e) => Err(e),
        };
        return match result {
            Ok(()) => {
                println!("Cache cleared.");
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("{} Failed to clear cache: {}", "Error:".red().bold(), e);
                ExitCode::FAILURE
            }
        };
    }

    let title = match searchable_title(args.title.as_deref()) {
        Some(title) => title.to_string(),
        None => {
            eprintln!("{} Title must not be blank", "Error:".red().bold());
            return ExitCode::FAILURE;
        }
    };

    let config = ResolverConfig {
        google_api_key: args.google_api_key,
        worker_pool_size: args.workers,
        cache_enabled: !args.no_cache,
        ..ResolverConfig::default()
    };

    let resolver = match IsbnResolver::from_config(&config) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("{} Failed to initialize resolver: {}", "Error:".red().bold(), e);
            return ExitCode::FAILURE;
        }
    };

    let spinner = ProgressBar::new_spinner();
    if !args.json {
        spinner.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        spinner.set_message(format!("Resolving {}...", title.trim().cyan()));
        spinner.enable_steady_tick(Duration::from_millis(100));
    }

    let result = resolver.get_isbns_by_title(&title, args.mode).await;
    spinner.finish_and_clear();
    resolver.shutdown();

    if args.json {
        match serde_json::to_string_pretty(&result) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("{} Failed to encode result: {}", "Error:".red().bold(), e);
                return ExitCode::FAILURE;
            }
        }
    } else {
        Report::new(&result).print();
    }

    if result.is_empty() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_title_is_passed_through_untrimmed() {
        assert_eq!(searchable_title(Some("  Clean Code ")), Some("  Clean Code "));
        assert_eq!(searchable_title(Some("   ")), None);
        assert_eq!(searchable_title(None), None);
    }
}
