//! support-nba command line interface
//!
//! One subcommand per pipeline stage plus `run` for the whole chain. Every
//! stage reads the previous stage's artifact and writes its own, so stages
//! can be re-run independently and a run resumed where it stopped.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use uuid::Uuid;

use support_nba_capability::{HttpCapability, ScriptedCapability};
use support_nba_config::{load_settings, Settings};
use support_nba_core::{
    Capability, Channel, Comparison, ConversationThread, CustomerHistory, Decision, Evaluation,
    FixedChannelStats, PolicyVariant, Recommendation, Tag, ThreadStatus,
};
use support_nba_pipeline::{
    compare, customer_histories, decide, evaluate, export_csv, ingest, reconstruct,
    ArtifactStore, DecisionContext, Runner, Tagger,
};

#[derive(Parser)]
#[command(name = "support-nba", version, about = "Next-best-action engine for support conversations")]
struct Cli {
    /// Path to a TOML settings file
    #[arg(long, global = true)]
    config: Option<String>,

    /// Use the deterministic offline backend instead of the HTTP capability
    #[arg(long, global = true)]
    offline: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Load raw records from a JSON or CSV export into the artifact store
    Ingest { input: PathBuf },
    /// Reconstruct conversation threads from ingested records
    Thread,
    /// Tag threads (support type, sentiment, resolution, personality)
    Tag {
        /// Re-tag threads that already have tags, appending a new version
        #[arg(long)]
        retag: bool,
    },
    /// Decide the next best action for tagged threads
    Decide {
        /// Decision instant, RFC 3339; defaults to now
        #[arg(long)]
        as_of: Option<String>,
    },
    /// Judge recommendations and compare policy variants
    Evaluate,
    /// Export recommendations joined with threads to CSV
    Export { output: PathBuf },
    /// Full pipeline: ingest, thread, tag, decide, evaluate, export
    Run {
        input: PathBuf,
        /// CSV output path; skipped when absent
        #[arg(long)]
        output: Option<PathBuf>,
        #[arg(long)]
        as_of: Option<String>,
    },
}

fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();
}

fn backend(cli: &Cli, settings: &Settings) -> anyhow::Result<Arc<dyn Capability>> {
    if cli.offline {
        tracing::info!("Using offline scripted capability backend");
        return Ok(Arc::new(ScriptedCapability::new()));
    }
    let http = HttpCapability::new(settings.capability.clone())
        .context("Failed to construct capability backend")?;
    Ok(Arc::new(http))
}

fn parse_as_of(raw: Option<&str>) -> anyhow::Result<DateTime<Utc>> {
    match raw {
        None => Ok(Utc::now()),
        Some(raw) => DateTime::parse_from_rfc3339(raw)
            .map(|t| t.with_timezone(&Utc))
            .with_context(|| format!("Invalid --as-of timestamp: {raw}")),
    }
}

/// Channel success rates from settings; channels without a configured
/// rate keep the neutral 0.5.
fn configured_stats(settings: &Settings) -> FixedChannelStats {
    let mut stats = FixedChannelStats::uniform();
    for (name, rate) in &settings.decision.channel_stats {
        if let Some(channel) = Channel::parse(name) {
            stats.set(channel, *rate);
        }
    }
    stats
}

/// Wire Ctrl-C to the runner's cancellation switch.
fn hook_ctrl_c(cancel: support_nba_pipeline::CancelHandle) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, finishing in-flight work");
            cancel.cancel();
        }
    });
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let settings = match load_settings(cli.config.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to load settings, using defaults");
            Settings::default()
        }
    };
    let store = ArtifactStore::new(&settings.artifacts.dir);

    match &cli.command {
        Command::Ingest { input } => run_ingest(&store, input),
        Command::Thread => run_thread(&settings, &store),
        Command::Tag { retag } => run_tag(&cli, &settings, &store, *retag).await,
        Command::Decide { as_of } => {
            run_decide(&cli, &settings, &store, parse_as_of(as_of.as_deref())?).await
        }
        Command::Evaluate => run_evaluate(&cli, &settings, &store).await,
        Command::Export { output } => run_export(&store, output),
        Command::Run {
            input,
            output,
            as_of,
        } => {
            let as_of = parse_as_of(as_of.as_deref())?;
            run_ingest(&store, input)?;
            run_thread(&settings, &store)?;
            run_tag(&cli, &settings, &store, false).await?;
            run_decide(&cli, &settings, &store, as_of).await?;
            run_evaluate(&cli, &settings, &store).await?;
            if let Some(output) = output {
                run_export(&store, output)?;
            }
            Ok(())
        }
    }
}

fn run_ingest(store: &ArtifactStore, input: &PathBuf) -> anyhow::Result<()> {
    let records = ingest::load_records(input)?;
    store.save_records(&records)?;
    println!("Ingested {} records", records.len());
    Ok(())
}

fn run_thread(settings: &Settings, store: &ArtifactStore) -> anyhow::Result<()> {
    let records = store.load_records()?;
    if records.is_empty() {
        bail!("No ingested records; run `support-nba ingest <input>` first");
    }
    let window = chrono::Duration::hours(settings.threading.link_window_hours as i64);
    let report = reconstruct(records, window);
    store.save_reconstruction(&report)?;
    println!(
        "Reconstructed {} threads ({} quarantined, {} anomalies, {} duplicates dropped)",
        report.threads.len(),
        report.quarantined.len(),
        report.anomalies.len(),
        report.duplicates_dropped
    );
    Ok(())
}

async fn run_tag(
    cli: &Cli,
    settings: &Settings,
    store: &ArtifactStore,
    retag: bool,
) -> anyhow::Result<()> {
    let threads = store.load_threads()?;
    if threads.is_empty() {
        bail!("No threads artifact; run `support-nba thread` first");
    }
    let latest = store.latest_tags()?;

    let items: Vec<(ConversationThread, u32)> = threads
        .into_iter()
        .filter(|t| retag || !latest.contains_key(&t.thread_id))
        .map(|t| {
            let version = latest.get(&t.thread_id).map(|tag| tag.version + 1).unwrap_or(1);
            (t, version)
        })
        .collect();
    if items.is_empty() {
        println!("All threads already tagged (use --retag to append a new version)");
        return Ok(());
    }

    let tagger = Arc::new(Tagger::new(
        backend(cli, settings)?,
        settings.tagging.confidence_threshold,
        settings.tagging.personality_enabled,
    ));
    let (runner, cancel) = Runner::new(settings.runner.max_in_flight);
    hook_ctrl_c(cancel);

    let summary = runner
        .run_all(
            items,
            |(thread, _)| thread.thread_id.clone(),
            move |(thread, version)| {
                let tagger = tagger.clone();
                async move { tagger.tag(&thread, version).await }
            },
        )
        .await;

    // Persist whatever finished before judging the run fatal
    store.append_tags(&summary.completed)?;
    mark_tagged_threads(store)?;
    println!(
        "Tagged {} threads ({} failed, {} skipped)",
        summary.completed.len(),
        summary.failures.len(),
        summary.skipped
    );
    summary.into_result()?;
    Ok(())
}

fn mark_tagged_threads(store: &ArtifactStore) -> anyhow::Result<()> {
    let tagged = store.latest_tags()?;
    let mut threads = store.load_threads()?;
    for thread in &mut threads {
        if tagged.contains_key(&thread.thread_id) {
            thread.status = ThreadStatus::Tagged;
        }
    }
    store.save_threads(&threads)?;
    Ok(())
}

async fn run_decide(
    cli: &Cli,
    settings: &Settings,
    store: &ArtifactStore,
    as_of: DateTime<Utc>,
) -> anyhow::Result<()> {
    let threads = store.load_threads()?;
    let tags = store.latest_tags()?;
    let histories = customer_histories(&threads, &tags);
    let items: Vec<(ConversationThread, Tag, Option<CustomerHistory>)> = threads
        .into_iter()
        .filter_map(|t| {
            let tag = tags.get(&t.thread_id).cloned()?;
            let history = t
                .customer_id
                .as_deref()
                .and_then(|customer| histories.get(customer).cloned());
            Some((t, tag, history))
        })
        .collect();
    if items.is_empty() {
        bail!("No tagged threads; run `support-nba tag` first");
    }

    let base_ctx = DecisionContext {
        policy: PolicyVariant::Baseline,
        weights: settings.decision.weights,
        epsilon: settings.decision.epsilon,
        cooldown_minutes: settings.decision.cooldown_minutes,
        stats: Arc::new(configured_stats(settings)),
        as_of,
        generator: Some(backend(cli, settings)?),
        customer_history: None,
    };
    let (runner, cancel) = Runner::new(settings.runner.max_in_flight);
    hook_ctrl_c(cancel);

    let summary = runner
        .run_all(
            items,
            |(thread, _, _)| thread.thread_id.clone(),
            move |(thread, tag, history)| {
                let mut base_ctx = base_ctx.clone();
                base_ctx.customer_history = history;
                async move {
                    let mut decisions = vec![decide(&thread, &tag, &base_ctx).await?];
                    // A personality label unlocks the second policy variant
                    if tag.personality.is_some() {
                        let variant_ctx = DecisionContext {
                            policy: PolicyVariant::PersonalityAware,
                            ..base_ctx
                        };
                        decisions.push(decide(&thread, &tag, &variant_ctx).await?);
                    }
                    Ok(decisions)
                }
            },
        )
        .await;

    let mut recommendations: Vec<Recommendation> = Vec::new();
    let mut not_actionable = 0usize;
    for decision in summary.completed.iter().flatten() {
        match decision {
            Decision::Recommend(rec) => recommendations.push(rec.clone()),
            Decision::NotActionable { thread_id, reason } => {
                tracing::info!(thread_id = %thread_id, reason = %reason, "Not actionable");
                not_actionable += 1;
            }
        }
    }
    store.append_recommendations(&recommendations)?;
    println!(
        "Decided {} recommendations ({} not actionable, {} failed, {} skipped)",
        recommendations.len(),
        not_actionable,
        summary.failures.len(),
        summary.skipped
    );
    summary.into_result()?;
    Ok(())
}

async fn run_evaluate(cli: &Cli, settings: &Settings, store: &ArtifactStore) -> anyhow::Result<()> {
    let threads: HashMap<String, ConversationThread> = store
        .load_threads()?
        .into_iter()
        .map(|t| (t.thread_id.clone(), t))
        .collect();
    let tags = store.latest_tags()?;
    let existing = store.load_evaluations()?;
    let already: HashSet<Uuid> = existing.iter().map(|e| e.recommendation_id).collect();

    let items: Vec<(Recommendation, ConversationThread, Tag)> = store
        .load_recommendations()?
        .into_iter()
        .filter(|rec| !already.contains(&rec.id))
        .filter_map(|rec| {
            let thread = threads.get(&rec.thread_id).cloned()?;
            let tag = tags.get(&rec.thread_id).cloned()?;
            Some((rec, thread, tag))
        })
        .collect();
    if items.is_empty() && existing.is_empty() {
        bail!("No recommendations to evaluate; run `support-nba decide` first");
    }

    let judge = backend(cli, settings)?;
    let samples = settings.evaluation.judge_samples;
    let (runner, cancel) = Runner::new(settings.runner.max_in_flight);
    hook_ctrl_c(cancel);

    let summary = runner
        .run_all(
            items,
            |(rec, _, _)| rec.thread_id.clone(),
            move |(rec, thread, tag)| {
                let judge = judge.clone();
                async move { evaluate(&rec, &thread, &tag, judge.as_ref(), samples).await }
            },
        )
        .await;

    let mut evaluations = existing;
    evaluations.extend(summary.completed.iter().cloned());
    store.save_evaluations(&evaluations)?;
    store.save_comparisons(&build_comparisons(&evaluations))?;
    println!(
        "Evaluated {} recommendations ({} failed, {} skipped)",
        summary.completed.len(),
        summary.failures.len(),
        summary.skipped
    );
    summary.into_result()?;
    Ok(())
}

/// Latest evaluation per (thread, policy); threads with both variants get a
/// comparison row.
fn build_comparisons(evaluations: &[Evaluation]) -> Vec<Comparison> {
    let mut latest: HashMap<(String, PolicyVariant), &Evaluation> = HashMap::new();
    for evaluation in evaluations {
        latest.insert(
            (evaluation.thread_id.clone(), evaluation.policy),
            evaluation,
        );
    }

    let mut thread_ids: Vec<&String> = latest
        .keys()
        .map(|(thread_id, _)| thread_id)
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();
    thread_ids.sort();

    thread_ids
        .into_iter()
        .filter_map(|thread_id| {
            let baseline = latest.get(&(thread_id.clone(), PolicyVariant::Baseline))?;
            let variant = latest.get(&(thread_id.clone(), PolicyVariant::PersonalityAware))?;
            Some(compare(baseline, variant))
        })
        .collect()
}

fn run_export(store: &ArtifactStore, output: &PathBuf) -> anyhow::Result<()> {
    let recommendations = store.load_recommendations()?;
    if recommendations.is_empty() {
        bail!("No recommendations to export; run `support-nba decide` first");
    }
    let threads = store.load_threads()?;
    let rows = export_csv(&recommendations, &threads, output)?;
    println!("Exported {rows} rows to {}", output.display());
    Ok(())
}
