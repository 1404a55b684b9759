//! Basic usage example for the libretag library.
//!
//! Previews, then performs, a retag against a local registry.
//!
//! Run with: cargo run --example basic_usage -- localhost:5000/team/app:build-1 production

use libretag::auth::DockerConfigProvider;
use libretag::report::{self, ReportOptions};
use libretag::{RetagRequest, Retagger};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args().skip(1);
    let source = args
        .next()
        .unwrap_or_else(|| "localhost:5000/team/app:build-1".to_string());
    let new_tag = args.next().unwrap_or_else(|| "production".to_string());

    let retagger = Retagger::builder()
        .with_credentials(DockerConfigProvider::from_environment()?)
        .build()?;
    let cancel = CancellationToken::new();
    let options = ReportOptions::default();

    let preview = RetagRequest::new(&source, &new_tag).dry_run(true);
    match retagger.retag(&preview, &cancel).await {
        Ok(outcome) => println!("{}", report::render(&outcome, &options)),
        Err(e) => {
            eprintln!("{}", report::render_failure(&e));
            eprintln!("  Make sure a registry is running at localhost:5000");
            eprintln!("  You can start one with: docker run -d -p 5000:5000 registry:2");
            return Ok(());
        }
    }

    let outcome = retagger
        .retag(&RetagRequest::new(&source, &new_tag), &cancel)
        .await?;
    println!("{}", report::render(&outcome, &options));

    Ok(())
}
