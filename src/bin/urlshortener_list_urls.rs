//! Lists every URL the authenticated user has shortened.

use clap::Parser;
use futures::TryStreamExt;
use google_api_samples::cli::{self, SampleApp, SampleArgs};
use google_api_samples::console;
use google_api_samples::paging::fetch_pages;
use google_api_samples::services::urlshortener::{UrlshortenerService, URLSHORTENER_SCOPE};

const APP: SampleApp = SampleApp {
    title: "URLShortener -- List URLs",
    namespace: "google.samples.urlshortener",
    application_key: "S7Uf8AsapUWrac798uga5U8e5azePhAf",
    scopes: &[URLSHORTENER_SCOPE],
};

#[derive(Parser)]
#[command(name = "urlshortener-list-urls")]
#[command(about = "List all URLs you have shortened with goo.gl", long_about = None)]
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
    let service = UrlshortenerService::new(config.services.base_url.clone(), &credential);

    console::write_action("Retrieving list of shortened urls...");

    let urls = fetch_pages(|cursor| service.list_history(cursor));
    futures::pin_mut!(urls);

    let mut count = 0usize;
    while let Some(url) = urls.try_next().await? {
        count += 1;
        let long_url = url.long_url.as_deref().unwrap_or("?");
        console::write_result(format!("{}.) URL", count), format!("{} -> {}", url.id, long_url));
    }

    if count == 0 {
        console::write_action("You don't have any shortened URLs! Visit http://goo.gl and create some.");
    } else {
        console::write_success(format!("Listed {} shortened URLs", count));
    }

    Ok(())
}
