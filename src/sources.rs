use anyhow::Result;

use crate::config::Config;
use crate::connector_git::has_working_copy;

pub fn list_sources(config: &Config) -> Result<()> {
    if config.sources.is_empty() {
        println!("No sources configured.");
        return Ok(());
    }

    println!("{:<20} {:<10} {:<12} PATH", "SOURCE", "BRANCH", "LOCAL COPY");
    for source in &config.sources {
        let location = source.location(&config.sync);
        let status = if has_working_copy(&location.local_path) {
            "present"
        } else {
            "missing"
        };
        println!(
            "{:<20} {:<10} {:<12} {}",
            location.name,
            location.branch,
            status,
            location.local_path.display()
        );
    }

    println!();
    println!("sync budget: {} calls per process", config.sync.rate_limit);

    Ok(())
}
