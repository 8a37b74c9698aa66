//! Lists the authenticated user's Buzz activity feed.

use clap::Parser;
use futures::TryStreamExt;
use google_api_samples::cli::{self, SampleApp, SampleArgs};
use google_api_samples::console;
use google_api_samples::paging::fetch_pages;
use google_api_samples::services::buzz::{BuzzService, FeedScope, BUZZ_READONLY_SCOPE};

const APP: SampleApp = SampleApp {
    title: "Buzz: List activities",
    namespace: "google.samples.buzz",
    application_key: "b9=Branuhe7ufrab?exA#a?e",
    scopes: &[BUZZ_READONLY_SCOPE],
};

#[derive(Parser)]
#[command(name = "buzz-list-activities")]
#[command(about = "List recent activities from your Buzz feed", long_about = None)]
#[command(version)]
struct Cli {
    #[command(flatten)]
    sample: SampleArgs,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    cli::init_tracing();
    let args = Cli::parse();

    console::display_header(APP.title);
    let config = args.sample.load_config()?;
    let credential = cli::authorize(&APP, &args.sample, &config).await?;
    let service = BuzzService::new(config.services.base_url.clone(), &credential);

    console::write_action("Fetching activities ...");
    println!();

    let activities =
        fetch_pages(|cursor| service.list_activities(FeedScope::Consumption, "@me", cursor));
    futures::pin_mut!(activities);

    let mut count = 0usize;
    while let Some(activity) = activities.try_next().await? {
        count += 1;
        console::write_result(&activity.actor.name, &activity.title);
    }

    if count == 0 {
        console::write_error("There are no activities to fetch!");
    }

    Ok(())
}
