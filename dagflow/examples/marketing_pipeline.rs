//! A marketing-orders pipeline: read, analyze, branch on order quality,
//! aggregate, notify. Demonstrates retry policies, branching, trigger
//! rules, and a one-failed alert step.
//!
//! Run with `cargo run --example marketing_pipeline`.

use dagflow::prelude::*;
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

/// (order id, status, amount)
const ORDERS: &[(&str, &str, f64)] = &[
    ("ord-1001", "completed", 120.0),
    ("ord-1002", "completed", 89.5),
    ("ord-1003", "cancelled", 45.0),
    ("ord-1004", "completed", 210.0),
    ("ord-1005", "pending", 74.9),
    ("ord-1006", "completed", 33.3),
];

fn read_orders() -> Arc<dyn Step> {
    Arc::new(FnStep::new(|_ctx: &StepContext| {
        let total = ORDERS.len();
        let completed = ORDERS.iter().filter(|(_, s, _)| *s == "completed").count();
        let revenue: f64 = ORDERS.iter().map(|(_, _, a)| a).sum();
        info!(total, completed, "read orders from source");
        Ok(json!({
            "total_orders": total,
            "completed_orders": completed,
            "problem_orders": total - completed,
            "total_revenue": revenue,
        }))
    }))
}

fn analyze_orders() -> Arc<dyn Step> {
    Arc::new(FnStep::new(|ctx: &StepContext| {
        let stats = ctx
            .inputs()
            .get("read_orders")?
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("no order stats available"))?;
        let total = stats["total_orders"].as_u64().unwrap_or(0);
        let completed = stats["completed_orders"].as_u64().unwrap_or(0);
        #[allow(clippy::cast_precision_loss)]
        let success_rate = if total > 0 {
            completed as f64 / total as f64 * 100.0
        } else {
            0.0
        };
        info!(success_rate, "analyzed order quality");
        Ok(json!({
            "completed_orders": completed,
            "problem_orders": total - completed,
            "success_rate": success_rate,
        }))
    }))
}

fn decide_processing_path() -> Arc<dyn Step> {
    Arc::new(FnStep::new(|ctx: &StepContext| {
        let analysis = ctx
            .inputs()
            .get("analyze_orders")?
            .cloned()
            .unwrap_or_default();
        let completed = analysis["completed_orders"].as_u64().unwrap_or(0);
        let problems = analysis["problem_orders"].as_u64().unwrap_or(0);
        // Tilt toward the problem path when the decision data is unusable.
        let target = if completed >= problems && completed > 0 {
            "process_successful_orders"
        } else {
            "process_problem_orders"
        };
        info!(completed, problems, target, "selected processing path");
        Ok(json!(target))
    }))
}

fn process_orders(wanted_completed: bool) -> Arc<dyn Step> {
    Arc::new(FnStep::new(move |_ctx: &StepContext| {
        let selected: Vec<_> = ORDERS
            .iter()
            .filter(|(_, s, _)| (*s == "completed") == wanted_completed)
            .collect();
        let value: f64 = selected.iter().map(|(_, _, a)| a).sum();
        info!(count = selected.len(), value, "processed order subset");
        Ok(json!({
            "count": selected.len(),
            "total_value": value,
        }))
    }))
}

fn create_executive_summary() -> Arc<dyn Step> {
    Arc::new(FnStep::new(|ctx: &StepContext| {
        // Exactly one processing path ran; summarize whichever is present.
        let (path, report) = if let Some(r) = ctx.inputs().get("process_successful_orders")? {
            ("successful_orders", r.clone())
        } else if let Some(r) = ctx.inputs().get("process_problem_orders")? {
            ("problem_orders", r.clone())
        } else {
            return Err(anyhow::anyhow!("no processing report available"));
        };
        info!(path, "built executive summary");
        Ok(json!({
            "processing_path": path,
            "report": report,
        }))
    }))
}

fn send_notification() -> Arc<dyn Step> {
    Arc::new(FnStep::new(|ctx: &StepContext| {
        let summary = ctx
            .inputs()
            .get("create_executive_summary")?
            .cloned()
            .unwrap_or_default();
        info!(%summary, "notification dispatched to the marketing team");
        Ok(json!("notification sent"))
    }))
}

fn failure_alert() -> Arc<dyn Step> {
    Arc::new(FnStep::new(|_ctx: &StepContext| {
        warn!("a pipeline step failed; paging the on-call operator");
        Ok(json!("alert sent"))
    }))
}

fn error_mail_hook() -> Arc<dyn FailureHook> {
    Arc::new(FnHook::new(
        |step: &str, attempt: usize, error: &(dyn std::error::Error + 'static)| {
            warn!(step, attempt, %error, "sending error mail to the operators");
            Ok(())
        },
    ))
}

fn build_pipeline() -> StepGraph {
    let work_steps = [
        "read_orders",
        "analyze_orders",
        "decide_processing_path",
        "process_successful_orders",
        "process_problem_orders",
    ];

    let mut builder = GraphBuilder::new("marketing_orders")
        .with_default_retry(RetryPolicy::new().with_max_attempts(3).with_delay_ms(500));

    builder.add_step(
        StepSpec::new("start", Arc::new(NoOpStep::new())).with_display_name("Start pipeline"),
    );
    builder.add_step(
        StepSpec::new("read_orders", read_orders())
            .with_predecessor("start")
            .with_retry(RetryPolicy::new().with_max_attempts(2).with_delay_ms(250))
            .with_on_failure(error_mail_hook())
            .with_display_name("Read orders from source"),
    );
    builder.add_step(
        StepSpec::new("analyze_orders", analyze_orders())
            .with_predecessor("read_orders")
            .with_on_failure(error_mail_hook())
            .with_display_name("Analyze order quality"),
    );
    builder.add_branch(
        StepSpec::new("decide_processing_path", decide_processing_path())
            .with_predecessor("analyze_orders")
            .with_on_failure(error_mail_hook())
            .with_display_name("Choose processing path"),
        ["process_successful_orders", "process_problem_orders"],
    );
    builder.add_step(
        StepSpec::new("process_successful_orders", process_orders(true))
            .with_predecessor("decide_processing_path")
            .with_display_name("Process successful orders"),
    );
    builder.add_step(
        StepSpec::new("process_problem_orders", process_orders(false))
            .with_predecessor("decide_processing_path")
            .with_display_name("Process problem orders"),
    );
    builder.add_step(
        StepSpec::new("create_executive_summary", create_executive_summary())
            .with_predecessors(["process_successful_orders", "process_problem_orders"])
            .with_trigger_rule(TriggerRule::NoneFailedMinOneSuccess)
            .with_display_name("Create executive summary"),
    );
    builder.add_step(
        StepSpec::new("send_notification", send_notification())
            .with_predecessor("create_executive_summary")
            .with_trigger_rule(TriggerRule::NoneFailedMinOneSuccess)
            .with_display_name("Send success notification"),
    );
    builder.add_step(
        StepSpec::new("end", Arc::new(NoOpStep::new()))
            .with_predecessor("send_notification")
            .with_trigger_rule(TriggerRule::NoneFailedMinOneSuccess)
            .with_display_name("Finish pipeline"),
    );
    builder.add_step(
        StepSpec::new("failure_alert", failure_alert())
            .with_predecessors(work_steps)
            .with_trigger_rule(TriggerRule::OneFailed)
            .with_display_name("Urgent failure alert"),
    );

    builder.build()
}

#[tokio::main]
async fn main() -> Result<(), DagflowError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let graph = build_pipeline();
    let ctx = RunContext::new().with_event_sink(Arc::new(LoggingEventSink::info()));
    let run = graph.run(ctx).await?;

    let mut names: Vec<_> = run.states().keys().cloned().collect();
    names.sort();
    for name in names {
        match run.result(&name) {
            Ok(outcome) => info!(step = %name, ?outcome, "final outcome"),
            Err(err) => warn!(step = %name, %err, "no outcome recorded"),
        }
    }
    Ok(())
}
