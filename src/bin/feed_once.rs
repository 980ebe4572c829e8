//! One feed run for cron-style hosting. Honors the idempotency gate unless `--force`.

use anyhow::{bail, Result};
use chrono::Utc;

use ai_knowledge_feed::{build_pipeline, config::FeedConfig, init_tracing, RunError};

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    init_tracing();

    let mut force = false;
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--force" | "-f" => force = true,
            other => bail!("unknown argument {other:?} (usage: feed_once [--force])"),
        }
    }

    let cfg = FeedConfig::load_default()?;
    let pipeline = build_pipeline(&cfg).await?;

    if !force && !pipeline.should_fetch(Utc::now()).await? {
        let last = pipeline
            .last_successful_run()
            .await?
            .and_then(|l| l.completed_at);
        tracing::info!(last_fetch = ?last, "not due yet; pass --force to run anyway");
        return Ok(());
    }

    match pipeline.run_daily_update().await {
        Ok(s) => {
            println!("{}", serde_json::to_string_pretty(&s)?);
            Ok(())
        }
        Err(RunError::AlreadyRunning) => bail!("a feed run is already in progress"),
        Err(RunError::Failed(e)) => Err(e),
    }
}
