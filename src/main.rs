// Chirper moderation service entry point.
//
// **Architecture Overview:**
// - `core/` = Business logic (domain types, ports, the moderation pipeline)
// - `infra/` = Implementations of core traits (SQLite, Gemini, queue)
//
// This file's job is to:
// 1. Load configuration
// 2. Initialize services (dependency injection)
// 3. Run one of the small CLI commands, or the moderation worker daemon
//
// The web frontend is a separate concern: it talks to the same database and
// drives the same ChirpService API these commands do.

// These attrs point each module declaration at a more descriptive root file
// so we don't end up with a pile of mod.rs files that all look the same.
#[path = "core/core_layer.rs"]
mod core;
#[path = "infra/infra_layer.rs"]
mod infra;

use crate::core::chirps::{ChirpError, ChirpService, ChirpStore, SubmitOutcome};
use crate::core::jobs::{JobQueue, ModerationJob};
use crate::core::moderation::{ModerateChirp, ModerationService};
use crate::core::quota::QuotaTracker;
use crate::core::throttle::SubmissionThrottle;
use crate::infra::ai::GeminiModerator;
use crate::infra::cache::InMemoryCounterStore;
use crate::infra::chirps::SqliteChirpStore;
use crate::infra::jobs::{run_worker, InProcessQueue};
use std::sync::Arc;
use std::time::Duration;

/// How often the worker daemon sweeps the database for pending chirps.
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// How long `post`/`edit` wait for the verdict before giving up. Covers a
/// full job attempt plus scheduling slack.
const RESOLVE_WAIT: Duration = Duration::from_secs(75);

struct App {
    service: ChirpService<SqliteChirpStore, Arc<InMemoryCounterStore>, InProcessQueue>,
    store: Arc<SqliteChirpStore>,
    quota: Arc<QuotaTracker<Arc<InMemoryCounterStore>>>,
    queue: Arc<InProcessQueue>,
    worker: tokio::task::JoinHandle<()>,
}

async fn build_app() -> App {
    let api_key = std::env::var("GEMINI_API_KEY").unwrap_or_default();
    if api_key.is_empty() {
        tracing::warn!(
            "GEMINI_API_KEY not set - moderation will rely on the fallback rules only"
        );
    }

    // Keep runtime databases in a dedicated folder so the repo root stays tidy.
    let db_path = std::env::var("CHIRPER_DATABASE_URL").unwrap_or_else(|_| {
        std::fs::create_dir_all("data").expect("Failed to create data directory");
        "data/chirper.db".to_string()
    });

    // ========================================================================
    // DEPENDENCY INJECTION
    // ========================================================================
    // This is the "composition root" where everything gets wired together.

    let store = Arc::new(
        SqliteChirpStore::new(&db_path)
            .await
            .expect("Failed to initialize chirp store"),
    );

    // Quota and throttle counters share one counter store. In-memory here;
    // multi-process deployments put a shared cache behind the same trait.
    let counters = Arc::new(InMemoryCounterStore::new());
    let quota = Arc::new(QuotaTracker::new(Arc::clone(&counters)));
    let throttle = SubmissionThrottle::new(Arc::clone(&counters));

    let moderation = Arc::new(ModerationService::new(
        GeminiModerator::new(api_key),
        Arc::clone(&quota),
    ));

    let (queue, receiver) = InProcessQueue::new();
    let queue = Arc::new(queue);
    let handler = Arc::new(ModerateChirp::new(Arc::clone(&store), moderation));
    let worker = tokio::spawn(run_worker(receiver, handler));

    let service = ChirpService::new(
        Arc::clone(&store),
        throttle,
        Arc::clone(&quota),
        Arc::clone(&queue),
    );

    App {
        service,
        store,
        quota,
        queue,
        worker,
    }
}

/// Push every pending chirp onto the queue. Safe to repeat: moderating a
/// chirp twice just rewrites the same columns.
async fn sweep_pending(app: &App) {
    match app.store.list_pending().await {
        Ok(pending) => {
            if !pending.is_empty() {
                tracing::info!(count = pending.len(), "Sweeping pending chirps onto the queue");
            }
            for chirp in pending {
                if let Err(e) = app.queue.enqueue(ModerationJob { chirp_id: chirp.id }).await {
                    tracing::error!(chirp_id = chirp.id, "Failed to enqueue chirp: {e}");
                }
            }
        }
        Err(e) => tracing::error!("Pending sweep failed: {e}"),
    }
}

/// Run the moderation worker daemon: drain the queue forever, sweeping the
/// database so a crash or deploy never strands a chirp in pending.
async fn run_daemon(app: App) {
    println!("🐦 Chirper moderation worker running");

    loop {
        sweep_pending(&app).await;
        tokio::time::sleep(SWEEP_INTERVAL).await;
    }
}

/// Wait for the moderation verdict on a freshly (re)submitted chirp.
async fn wait_for_verdict(app: &App, chirp_id: i64) {
    let deadline = tokio::time::Instant::now() + RESOLVE_WAIT;

    while tokio::time::Instant::now() < deadline {
        match app.store.get(chirp_id).await {
            Ok(Some(chirp)) if !chirp.state.is_pending() => {
                println!(
                    "Chirp {} is {}: {}",
                    chirp.id,
                    chirp.state.status(),
                    chirp.state.reason().unwrap_or("")
                );
                return;
            }
            Ok(_) => {}
            Err(e) => {
                eprintln!("Failed to check chirp {chirp_id}: {e}");
                return;
            }
        }
        tokio::time::sleep(Duration::from_millis(200)).await;
    }

    println!("Chirp {chirp_id} is still pending; the worker will finish it");
}

fn report_outcome(outcome: Result<SubmitOutcome, ChirpError>) -> Option<i64> {
    match outcome {
        Ok(SubmitOutcome::Accepted { chirp_id }) => {
            println!("Chirp {chirp_id} accepted and queued for moderation");
            Some(chirp_id)
        }
        Ok(SubmitOutcome::Throttled { retry_after_secs }) => {
            println!(
                "Rate limited: wait {} minutes before chirping again",
                (retry_after_secs + 59) / 60
            );
            None
        }
        Ok(SubmitOutcome::QuotaExhausted { message }) => {
            println!("{message}");
            None
        }
        Err(e) => {
            eprintln!("Error: {e}");
            None
        }
    }
}

fn usage() -> ! {
    eprintln!("Usage: chirper [worker]");
    eprintln!("       chirper post <user_id> <message>");
    eprintln!("       chirper edit <user_id> <chirp_id> <message>");
    eprintln!("       chirper feed");
    eprintln!("       chirper status");
    std::process::exit(2);
}

#[tokio::main]
async fn main() {
    // Initialize logging so we can see what's happening
    tracing_subscriber::fmt::init();

    // Load environment variables from .env file (if it exists)
    dotenv::dotenv().ok();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = args.first().map(String::as_str).unwrap_or("worker");

    let app = build_app().await;

    if command == "worker" {
        run_daemon(app).await;
        return;
    }

    match command {
        "post" => {
            let (user_id, message) = match (args.get(1), args.get(2..)) {
                (Some(id), Some(words)) if !words.is_empty() => {
                    let user_id: i64 = id.parse().unwrap_or_else(|_| usage());
                    (user_id, words.join(" "))
                }
                _ => usage(),
            };

            let outcome = app.service.submit(Some(user_id), &message).await;
            if let Some(chirp_id) = report_outcome(outcome) {
                wait_for_verdict(&app, chirp_id).await;
            }
        }

        "edit" => {
            let (user_id, chirp_id, message) = match (args.get(1), args.get(2), args.get(3..)) {
                (Some(id), Some(chirp), Some(words)) if !words.is_empty() => {
                    let user_id: i64 = id.parse().unwrap_or_else(|_| usage());
                    let chirp_id: i64 = chirp.parse().unwrap_or_else(|_| usage());
                    (user_id, chirp_id, words.join(" "))
                }
                _ => usage(),
            };

            let outcome = app.service.edit(Some(user_id), chirp_id, &message).await;
            if let Some(chirp_id) = report_outcome(outcome) {
                wait_for_verdict(&app, chirp_id).await;
            }
        }

        "feed" => match app.service.visible_chirps(50).await {
            Ok(chirps) if chirps.is_empty() => println!("No approved chirps yet"),
            Ok(chirps) => {
                for chirp in chirps {
                    println!(
                        "#{} [user {}] {}  ({})",
                        chirp.id,
                        chirp.user_id,
                        chirp.message,
                        chirp.created_at.format("%Y-%m-%d %H:%M")
                    );
                }
            }
            Err(e) => eprintln!("Failed to load feed: {e}"),
        },

        "status" => {
            match app.quota.remaining().await {
                Ok(remaining) => println!("Gemini requests remaining today: {remaining}"),
                Err(e) => eprintln!("Failed to read quota: {e}"),
            }
            match app.quota.status_message().await {
                Ok(message) => println!("{message}"),
                Err(e) => eprintln!("Failed to read quota status: {e}"),
            }
        }

        _ => usage(),
    }

    // Let in-flight moderation finish before the process exits.
    drop(app.service);
    drop(app.queue);
    let _ = app.worker.await;
}
