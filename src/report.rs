use crate::isbn::Isbn;
use crate::lookup::LookupResult;
use colored::Colorize;

/// Checksum verdict for one resolved identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChecksumStatus {
    /// Checksum verifies; carries the ISBN-13 form
    Valid(String),
    Invalid,
}

/// A lookup result annotated for display
pub struct Report<'a> {
    pub result: &'a LookupResult,
    pub checks: Vec<(String, ChecksumStatus)>,
}

impl<'a> Report<'a> {
    pub fn new(result: &'a LookupResult) -> Self {
        let checks = result
            .all_isbns()
            .iter()
            .map(|isbn| (isbn.clone(), checksum_status(isbn)))
            .collect();
        Self { result, checks }
    }

    pub fn count_invalid(&self) -> usize {
        self.checks
            .iter()
            .filter(|(_, status)| *status == ChecksumStatus::Invalid)
            .count()
    }

    /// Print the report to stdout with colors
    pub fn print(&self) {
        let result = self.result;

        println!();
        println!("{}", "isbnres Report".bold());
        println!("{}", "=".repeat(50));
        println!();

        println!("Title:   {}", result.title_searched().cyan());
        println!("Mode:    {}", result.mode());

        let origin = if result.cached() {
            "cache".dimmed().to_string()
        } else if result.sources_used().is_empty() {
            "(none)".dimmed().to_string()
        } else {
            result
                .sources_used()
                .iter()
                .map(|s| s.green().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        };
        println!("Sources: {}", origin);
        println!();

        if result.is_empty() {
            println!("{}", "NOT FOUND".dimmed().bold());
            println!();
            return;
        }

        match result.primary_isbn13() {
            Some(primary) => println!("Primary ISBN-13: {}", primary.green().bold()),
            None => println!("Primary ISBN-13: {}", "(none)".dimmed()),
        }
        println!();

        println!(
            "{}",
            format!("ISBNS ({})", self.checks.len()).green().bold()
        );
        for (isbn, status) in &self.checks {
            match status {
                ChecksumStatus::Valid(isbn13) if isbn13 != isbn => {
                    println!("  {} {}", isbn, format!("(ISBN-13 {})", isbn13).dimmed());
                }
                ChecksumStatus::Valid(_) => println!("  {}", isbn),
                ChecksumStatus::Invalid => {
                    println!("  {} {}", isbn, "WARN checksum does not verify".yellow());
                }
            }
        }

        let invalid = self.count_invalid();
        if invalid > 0 {
            println!();
            println!(
                "{} {} identifier(s) failed checksum validation",
                "Note:".yellow().bold(),
                invalid
            );
        }

        println!();
    }
}

fn checksum_status(isbn: &str) -> ChecksumStatus {
    match Isbn::parse(isbn) {
        Ok(parsed) => ChecksumStatus::Valid(parsed.to_isbn13().to_string()),
        Err(_) => ChecksumStatus::Invalid,
    }
}
