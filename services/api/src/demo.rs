use std::time::Instant;

use clap::Args;
use facility_router::config::AppConfig;
use facility_router::error::AppError;
use facility_router::routing::{Decision, RouteRequest};

use crate::infra::build_routing_service;

const DEMO_REQUESTS: [(Option<&str>, Option<&str>); 5] = [
    (Some("MRI"), None),
    (Some("CT"), None),
    (Some("lab"), None),
    (None, Some("cardiology")),
    (None, Some("imaging")),
];
const DEMO_FREE_TEXT: &str = "Follow-up for recurring chest pain after exercise";

#[derive(Args, Debug)]
pub(crate) struct RouteArgs {
    /// Patient to route, e.g. patient-00001
    #[arg(long)]
    pub(crate) patient_id: String,
    /// Requested capability or category (MRI, CT, lab, imaging, ...)
    #[arg(long)]
    pub(crate) request_type: Option<String>,
    /// Department hint, used when no request type is given
    #[arg(long)]
    pub(crate) department: Option<String>,
    /// Free text handed to the classifier when AI_CLASSIFY is on
    #[arg(long)]
    pub(crate) free_text: Option<String>,
    /// Replays the stored decision when reused
    #[arg(long)]
    pub(crate) idempotency_key: Option<String>,
}

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// How many sample patients to route
    #[arg(long, default_value_t = 5)]
    pub(crate) patients: usize,
}

impl RouteArgs {
    fn into_request(self) -> (RouteRequest, Option<String>) {
        let request = RouteRequest {
            request_type: self.request_type,
            department: self.department,
            free_text: self.free_text,
            ..RouteRequest::new(self.patient_id)
        };
        (request, self.idempotency_key)
    }
}

pub(crate) async fn run_route(args: RouteArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let service = build_routing_service(&config.assist)?;

    let (request, key) = args.into_request();
    let decision = service.route(request, key.as_deref()).await?;

    match serde_json::to_string_pretty(&decision) {
        Ok(json) => println!("{json}"),
        Err(err) => println!("Decision payload unavailable: {err}"),
    }
    Ok(())
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let service = build_routing_service(&config.assist)?;

    println!("Facility routing demo");
    println!(
        "Directory: {} facilities, {} prior routing events",
        service.facilities()?.len(),
        service.recent_events(usize::MAX)?.len()
    );
    println!(
        "Assist: classify {}, explain {}",
        on_off(config.assist.classify),
        on_off(config.assist.explain)
    );

    println!("\nDecisions");
    for index in 0..args.patients {
        let patient_id = format!("patient-{:05}", index * 7);
        let (request_type, department) = DEMO_REQUESTS[index % DEMO_REQUESTS.len()];
        let request = RouteRequest {
            request_type: request_type.map(str::to_string),
            department: department.map(str::to_string),
            ..RouteRequest::new(patient_id.as_str())
        };
        let label = request_type.or(department).unwrap_or("unspecified");

        let started = Instant::now();
        match service.route(request, None).await {
            Ok(decision) => render_decision(&patient_id, label, &decision, started),
            Err(err) => println!("- {patient_id} [{label}]: {err}"),
        }
    }

    println!("\nFree-text request");
    let request = RouteRequest::new("patient-00002").with_free_text(DEMO_FREE_TEXT);
    match service.route(request, None).await {
        Ok(decision) => {
            println!("  \"{DEMO_FREE_TEXT}\"");
            println!(
                "  -> {} ({}, confidence {:.3})",
                facility_label(&decision),
                decision.decision_status,
                decision.confidence
            );
        }
        Err(err) => println!("  Routing failed: {err}"),
    }

    println!("\nIdempotent replay");
    let key = "demo-replay-1";
    let first = service
        .route(RouteRequest::new("patient-00004").with_request_type("MRI"), Some(key))
        .await?;
    let replay = service
        .route(RouteRequest::new("patient-00004").with_request_type("MRI"), Some(key))
        .await?;
    println!("  First decision:  {}", first.decision_id);
    println!("  Replayed with same key: {}", replay.decision_id);
    println!(
        "  Same decision returned: {}",
        if first.decision_id == replay.decision_id { "yes" } else { "no" }
    );

    let summary = service.metrics_snapshot();
    println!("\nSummary");
    println!(
        "  routed {}, fallback {}, failed {}",
        summary.routed, summary.fallback, summary.failed
    );
    println!("  average confidence {:.4}", summary.avg_confidence);
    println!(
        "  latency ewma {:.2} ms, p50 {:.2} ms, p95 {:.2} ms",
        summary.ewma_ms, summary.p50_ms, summary.p95_ms
    );
    Ok(())
}

fn render_decision(patient_id: &str, label: &str, decision: &Decision, started: Instant) {
    println!(
        "- {patient_id} [{label}] -> {} ({}, confidence {:.3}, {:.1} ms)",
        facility_label(decision),
        decision.decision_status,
        decision.confidence,
        started.elapsed().as_secs_f64() * 1000.0
    );
    if let Some(features) = &decision.features_used {
        println!(
            "    capability {:.2} | proximity {:.2} | history {:.2} | capacity {:.2}",
            features.capability, features.inverse_distance, features.history, features.capacity
        );
    }
    println!("    {}", decision.reason);
}

fn facility_label(decision: &Decision) -> &str {
    decision
        .routed_facility()
        .map(|facility| facility.as_str())
        .unwrap_or("no facility")
}

fn on_off(enabled: bool) -> &'static str {
    if enabled {
        "on"
    } else {
        "off"
    }
}
