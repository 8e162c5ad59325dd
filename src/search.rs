//! `mdseek search`: ingest once, run one query, print the page.

use anyhow::{bail, Result};

use mdseek_core::models::SearchOutcome;

use crate::service::DocService;

pub async fn search_command(
    service: &DocService,
    query: &str,
    page: Option<i64>,
    size: Option<i64>,
) -> Result<()> {
    let report = service.ingest().await?;
    if !report.ok {
        bail!("{}", report.summary());
    }

    let outcome = service.search(query, page, size).await?;
    print_outcome(&outcome);
    Ok(())
}

pub fn print_outcome(outcome: &SearchOutcome) {
    let results = match outcome {
        SearchOutcome::NoResults => {
            println!("No results.");
            return;
        }
        SearchOutcome::Results(results) => results,
    };

    for (i, result) in results.iter().enumerate() {
        println!("{}. [{:.4}] {}", i + 1, result.distance, result.document_url);
        println!("    excerpt: \"{}\"", result.snippet.replace('\n', " "));
        println!();
    }
}
