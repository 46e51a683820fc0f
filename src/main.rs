use clap::Parser;
use listing_pager::ListingCrawl;
use std::error::Error;
use std::process::ExitCode;

mod args;
use args::Args;

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn Error>> {
    // Initialize logging
    env_logger::init();

    // Parse command-line arguments
    let args = Args::parse();
    let config = args.to_config()?;

    ::log::info!("Starting listing crawl at {}", config.start_url);
    ::log::debug!(
        "Discount {}%, WebDriver {}, max {} pages",
        config.discount_percent,
        config.webdriver_url,
        config.max_pages
    );

    let start_time = std::time::Instant::now();
    let response = ListingCrawl::default().with_config(config).run().await;
    ::log::info!(
        "Crawl finished with status {} in {:.2} seconds",
        response.status,
        start_time.elapsed().as_secs_f64()
    );

    let output = if args.pretty {
        serde_json::to_string_pretty(&response.body)?
    } else {
        serde_json::to_string(&response.body)?
    };
    println!("{}", output);

    Ok(if response.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
