use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::middleware;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::access::Resource;
use crate::analytics::costs::{
    labor_cost_at_technician_rates, profitability, project_costs, ProjectCosts, Profitability,
};
use crate::analytics::progress::overall_progress;
use crate::api::auth::require_capability;
use crate::api::projects::timeline_entry;
use crate::api::{new_id, require_text};
use crate::error::{AppError, AppResult};
use crate::models::{
    HoldReason, Invoice, InvoiceStatus, Project, ProjectStatus, Technician,
};
use crate::state::AppState;

const INVOICE_TERMS_DAYS: i64 = 30;

pub fn router() -> Router<AppState> {
    let finance = Router::new()
        .route("/projects/{project_id}/financials", get(get_financials))
        .route("/projects/{project_id}/invoices", post(add_invoice))
        .route(
            "/projects/{project_id}/invoices/{invoice_id}/pay",
            post(pay_invoice),
        )
        .route_layer(middleware::from_fn_with_state(
            Resource::Finance,
            require_capability,
        ));

    let reports = Router::new()
        .route("/reports/profitability", get(profitability_report))
        .route_layer(middleware::from_fn_with_state(
            Resource::Reports,
            require_capability,
        ));

    finance.merge(reports)
}

#[derive(Debug, Deserialize)]
struct InvoiceRequest {
    description: String,
    amount: f64,
}

#[derive(Debug, Serialize)]
pub struct FinancialSummary {
    pub project_id: String,
    pub total_quoted: f64,
    pub total_paid: f64,
    pub outstanding: f64,
    pub invoices: Vec<Invoice>,
    pub costs: ProjectCosts,
    pub profitability: Profitability,
    /// Labor priced at each assignee's own rate. Reported next to the
    /// workshop-rate figure in `costs`, which it does not replace.
    pub labor_cost_at_technician_rates: f64,
}

#[derive(Debug, Serialize)]
pub struct ProfitabilityRow {
    pub project_id: String,
    pub project_name: String,
    pub customer_name: String,
    pub status: ProjectStatus,
    pub progress: f64,
    pub total_quoted: f64,
    pub costs: ProjectCosts,
    pub profitability: Profitability,
}

fn summarize(project: Project, technicians: &[Technician], hourly_rate: f64) -> FinancialSummary {
    let costs = project_costs(&project, hourly_rate);
    FinancialSummary {
        project_id: project.id.clone(),
        total_quoted: project.financials.total_quoted,
        total_paid: project.financials.total_paid,
        outstanding: project.financials.total_quoted - project.financials.total_paid,
        profitability: profitability(&project, &costs),
        labor_cost_at_technician_rates: labor_cost_at_technician_rates(
            &project,
            technicians,
            hourly_rate,
        ),
        costs,
        invoices: project.financials.invoices,
    }
}

async fn get_financials(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
) -> AppResult<Json<FinancialSummary>> {
    let project = state.projects.get(&project_id).await?;
    let technicians = state.technicians.list().await?;
    Ok(Json(summarize(
        project,
        &technicians,
        state.config.labor_rate,
    )))
}

/// New invoices are pending, due after the standard terms, and add to the quoted total.
async fn add_invoice(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    Json(payload): Json<InvoiceRequest>,
) -> AppResult<(StatusCode, Json<Invoice>)> {
    if !payload.amount.is_finite() || payload.amount <= 0.0 {
        return Err(AppError::validation("amount must be greater than 0"));
    }

    let invoice = Invoice {
        id: new_id("inv"),
        description: require_text("description", &payload.description)?,
        amount: payload.amount,
        status: InvoiceStatus::Pending,
        due_date: (Utc::now() + Duration::days(INVOICE_TERMS_DAYS)).date_naive(),
    };

    let created = invoice.clone();
    state
        .projects
        .update(&project_id, |project| {
            project.financials.total_quoted += invoice.amount;
            project.financials.invoices.push(invoice);
            Ok(())
        })
        .await?;

    tracing::info!(%project_id, invoice_id = %created.id, amount = created.amount, "invoice added");
    Ok((StatusCode::CREATED, Json(created)))
}

/// Settles an invoice. A project held for payment goes back to active in the
/// same write.
async fn pay_invoice(
    State(state): State<AppState>,
    Path((project_id, invoice_id)): Path<(String, String)>,
) -> AppResult<Json<FinancialSummary>> {
    let now = Utc::now();
    let project = state
        .projects
        .update(&project_id, |project| {
            let invoice = project
                .financials
                .invoices
                .iter_mut()
                .find(|invoice| invoice.id == invoice_id)
                .ok_or_else(|| AppError::not_found("invoice", &invoice_id))?;
            if invoice.status == InvoiceStatus::Paid {
                return Err(AppError::Conflict(format!(
                    "invoice '{invoice_id}' is already paid"
                )));
            }

            invoice.status = InvoiceStatus::Paid;
            let amount = invoice.amount;
            let description = invoice.description.clone();
            project.financials.total_paid += amount;

            if project.status == ProjectStatus::OnHold
                && project.hold_reason == Some(HoldReason::AwaitingPayment)
            {
                project.status = ProjectStatus::Active;
                project.hold_reason = None;
                project.push_timeline(timeline_entry(
                    now,
                    format!("Payment received for \"{description}\". Project resumed."),
                    "Financial",
                ));
                tracing::info!(project_id = %project.id, "payment received, project resumed");
            }
            Ok(())
        })
        .await?;

    let technicians = state.technicians.list().await?;
    Ok(Json(summarize(
        project,
        &technicians,
        state.config.labor_rate,
    )))
}

async fn profitability_report(
    State(state): State<AppState>,
) -> AppResult<Json<Vec<ProfitabilityRow>>> {
    let projects = state.projects.list().await?;
    let hourly_rate = state.config.labor_rate;

    let rows = projects
        .iter()
        .map(|project| {
            let costs = project_costs(project, hourly_rate);
            ProfitabilityRow {
                project_id: project.id.clone(),
                project_name: project.vehicle.display_name(),
                customer_name: project.customer_name.clone(),
                status: project.status,
                progress: overall_progress(project),
                total_quoted: project.financials.total_quoted,
                profitability: profitability(project, &costs),
                costs,
            }
        })
        .collect();
    Ok(Json(rows))
}
