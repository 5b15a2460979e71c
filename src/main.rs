//! Screen Analytics demo
//!
//! Replays a scripted navigation session through the tracker and prints
//! the page views that reached the sinks:
//! - Home screen with an embedded, separately tracked carousel
//! - Push to an article tracked manually once its content "loads"
//! - Modal over the article, then dismissal
//! - Background / foreground round trip

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use screen_analytics::dispatch::{LoggingSink, MemorySink};
use screen_analytics::telemetry::init_logging;
use screen_analytics::trackable::StaticTrackable;
use screen_analytics::{
    BusinessUnit, HostTransition, LabelSet, LevelPath, Tracker, TrackerConfig,
    TrackableDeclaration,
};

// ──────────────────────────────────────────────────────────────────────────────
// CONFIGURATION
// ──────────────────────────────────────────────────────────────────────────────

async fn load_config() -> Result<TrackerConfig> {
    let config = match std::env::args().nth(1).map(PathBuf::from) {
        Some(path) => TrackerConfig::load(&path)
            .await
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => TrackerConfig::new(BusinessUnit::Rts, "demo-source-key"),
    };
    config.apply_env().context("Invalid SCREEN_ANALYTICS_* override")
}

// ──────────────────────────────────────────────────────────────────────────────
// MAIN ENTRY POINT
// ──────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    let _log_guard = init_logging("screen_analytics", None)
        .map_err(|e| anyhow::anyhow!("Failed to set tracing subscriber: {}", e))?;

    let config = load_config().await?;

    println!("\n{}", "═".repeat(60));
    println!("📊 Screen Analytics demo ({} / {})", config.business_unit, config.site_name());
    println!("{}\n", "═".repeat(60));

    let memory = Arc::new(MemorySink::new("memory"));
    let tracker = Tracker::builder(config)
        .sink(Arc::new(LoggingSink))
        .sink(memory.clone())
        .global_labels(Arc::new(LabelSet::from_pairs([("app_version", env!("CARGO_PKG_VERSION"))])))
        .start()
        .context("Failed to start tracker")?;

    let home = tracker.register(
        Arc::new(StaticTrackable::new(
            TrackableDeclaration::new("Home").with_levels(LevelPath::new(["app"])),
        )),
        None,
    )?;
    let carousel = tracker.register(
        Arc::new(StaticTrackable::new(
            TrackableDeclaration::new("Featured")
                .with_levels(LevelPath::new(["carousel"]))
                .with_labels(LabelSet::from_pairs([("position", "top")])),
        )),
        Some(home),
    )?;
    let article = tracker.register(
        Arc::new(StaticTrackable::new(
            TrackableDeclaration::new("Article")
                .with_levels(LevelPath::new(["news", "world"]))
                .manual(),
        )),
        None,
    )?;
    let share_sheet = tracker.register(Arc::new(StaticTrackable::titled("Share")), None)?;

    let script = [
        HostTransition::WillAppear(home),
        HostTransition::DidAppear(home),
        HostTransition::DidAppear(carousel),
        // Duplicate notification from the UI toolkit
        HostTransition::DidAppear(home),
        HostTransition::WillDisappear(home),
        HostTransition::DidDisappear(carousel),
        HostTransition::DidDisappear(home),
        HostTransition::DidAppear(article),
    ];
    for transition in script {
        tracker.observe(transition);
    }

    // Article content arrived
    tracker.track_unit(article);

    for transition in [
        HostTransition::Covered(article),
        HostTransition::DidAppear(share_sheet),
        HostTransition::DidDisappear(share_sheet),
        HostTransition::Uncovered(article),
        HostTransition::DidEnterBackground,
        HostTransition::WillEnterForeground,
    ] {
        tracker.observe(transition);
    }
    // Returning from background starts a new appearance of the article
    tracker.track_unit(article);

    tracker.track_event("share", Some(LabelSet::from_pairs([("target", "mail")])));

    let processed = tracker.stop().await;
    info!(processed, "Demo finished");

    println!("\n📜 Page views delivered:");
    for event in memory.take_page_views() {
        println!(
            "   #{} {} [{}] {}",
            event.sequence, event.title, event.levels, event.labels
        );
    }
    println!("   + {} custom event(s)\n", memory.custom_events().len());

    Ok(())
}
