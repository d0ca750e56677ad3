//! Evaluation stage
//!
//! Scores a recommendation with the judge capability from the customer's
//! perspective, optionally averaging over several independent judge calls,
//! and compares policy variants per thread. Judge variance across samples is
//! expected, not a failure.

use support_nba_capability::{parse, prompt};
use support_nba_core::{
    Capability, CapabilityKind, CapabilityRequest, Comparison, ConversationThread, Error,
    Evaluation, PolicyVariant, Recommendation, Result, Tag,
};

/// Judge one recommendation. `samples` independent calls are averaged;
/// raw judge outputs are kept verbatim for audit.
pub async fn evaluate(
    recommendation: &Recommendation,
    thread: &ConversationThread,
    tag: &Tag,
    judge: &dyn Capability,
    samples: u32,
) -> Result<Evaluation> {
    if samples == 0 {
        return Err(Error::Config(
            "evaluation requires at least one judge sample".to_string(),
        ));
    }

    let judge_prompt = prompt::judge(thread, tag, recommendation);
    let mut raw_judgments = Vec::with_capacity(samples as usize);
    let mut resolution_sum = 0.0;
    let mut tone_sum = 0.0;
    let mut judgment = String::new();

    for sample in 0..samples {
        let response = judge
            .invoke(CapabilityRequest::new(
                CapabilityKind::Judge,
                judge_prompt.clone(),
            ))
            .await?;
        let parsed = parse::judgment(&response.content).map_err(Error::from)?;
        tracing::debug!(
            thread_id = %recommendation.thread_id,
            sample,
            resolution = parsed.resolution_score,
            tone = parsed.tone_score,
            "Judge sample"
        );
        resolution_sum += parsed.resolution_score;
        tone_sum += parsed.tone_score;
        if judgment.is_empty() {
            judgment = parsed.evaluation;
        }
        raw_judgments.push(response.content);
    }

    let n = samples as f64;
    let resolution_score = resolution_sum / n;
    let tone_score = tone_sum / n;
    let quality_score = (resolution_score + tone_score) / 2.0;

    tracing::info!(
        thread_id = %recommendation.thread_id,
        policy = %recommendation.policy,
        quality = quality_score,
        samples,
        "Evaluated recommendation"
    );

    Ok(Evaluation {
        recommendation_id: recommendation.id,
        thread_id: recommendation.thread_id.clone(),
        policy: recommendation.policy,
        quality_score,
        resolution_score,
        tone_score,
        judgment,
        raw_judgments,
        samples,
    })
}

/// Compare two evaluations of the same thread under different policies.
/// Deltas are variant minus baseline; ties go to the baseline.
pub fn compare(baseline: &Evaluation, variant: &Evaluation) -> Comparison {
    let winner = if variant.quality_score > baseline.quality_score {
        variant.policy
    } else {
        baseline.policy
    };
    Comparison {
        thread_id: baseline.thread_id.clone(),
        winner,
        margin: (baseline.quality_score - variant.quality_score).abs(),
        resolution_delta: variant.resolution_score - baseline.resolution_score,
        tone_delta: variant.tone_score - baseline.tone_score,
        baseline_score: baseline.quality_score,
        variant_score: variant.quality_score,
    }
}
