use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::middleware;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;

use crate::access::Resource;
use crate::api::auth::require_capability;
use crate::api::{new_id, require_text};
use crate::error::{AppError, AppResult};
use crate::models::InventoryItem;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/inventory", get(list_items).post(create_item))
        .route("/inventory/low-stock", get(list_low_stock))
        .route(
            "/inventory/{item_id}",
            get(get_item).patch(update_item).delete(delete_item),
        )
        .route_layer(middleware::from_fn_with_state(
            Resource::Inventory,
            require_capability,
        ))
}

#[derive(Debug, Deserialize)]
struct CreateItemRequest {
    sku: String,
    name: String,
    #[serde(default)]
    stock_qty: u32,
    reorder_point: Option<u32>,
    supplier: Option<String>,
    unit_cost: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct UpdateItemRequest {
    name: Option<String>,
    stock_qty: Option<u32>,
    reorder_point: Option<u32>,
    supplier: Option<String>,
    unit_cost: Option<f64>,
}

async fn list_items(State(state): State<AppState>) -> AppResult<Json<Vec<InventoryItem>>> {
    Ok(Json(state.inventory.list().await?))
}

async fn list_low_stock(State(state): State<AppState>) -> AppResult<Json<Vec<InventoryItem>>> {
    let items = state
        .inventory
        .list()
        .await?
        .into_iter()
        .filter(InventoryItem::is_low_stock)
        .collect();
    Ok(Json(items))
}

async fn get_item(
    State(state): State<AppState>,
    Path(item_id): Path<String>,
) -> AppResult<Json<InventoryItem>> {
    Ok(Json(state.inventory.get(&item_id).await?))
}

async fn create_item(
    State(state): State<AppState>,
    Json(payload): Json<CreateItemRequest>,
) -> AppResult<(StatusCode, Json<InventoryItem>)> {
    validate_cost(payload.unit_cost)?;
    let sku = require_text("sku", &payload.sku)?;

    let items = state.inventory.list().await?;
    if items.iter().any(|item| item.sku.eq_ignore_ascii_case(&sku)) {
        return Err(AppError::Conflict(format!("sku '{sku}' already exists")));
    }

    let item = state
        .inventory
        .insert(InventoryItem {
            id: new_id("inv"),
            sku,
            name: require_text("name", &payload.name)?,
            stock_qty: payload.stock_qty,
            reorder_point: payload.reorder_point,
            supplier: payload.supplier,
            unit_cost: payload.unit_cost,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(item)))
}

async fn update_item(
    State(state): State<AppState>,
    Path(item_id): Path<String>,
    Json(payload): Json<UpdateItemRequest>,
) -> AppResult<Json<InventoryItem>> {
    validate_cost(payload.unit_cost)?;
    let name = payload
        .name
        .as_deref()
        .map(|name| require_text("name", name))
        .transpose()?;

    let item = state
        .inventory
        .update(&item_id, |item| {
            if let Some(name) = name {
                item.name = name;
            }
            if let Some(stock_qty) = payload.stock_qty {
                item.stock_qty = stock_qty;
            }
            if payload.reorder_point.is_some() {
                item.reorder_point = payload.reorder_point;
            }
            if payload.supplier.is_some() {
                item.supplier = payload.supplier;
            }
            if payload.unit_cost.is_some() {
                item.unit_cost = payload.unit_cost;
            }
            Ok(())
        })
        .await?;

    if item.is_low_stock() {
        tracing::info!(item_id = %item.id, stock_qty = item.stock_qty, "inventory item at or below reorder point");
    }
    Ok(Json(item))
}

async fn delete_item(
    State(state): State<AppState>,
    Path(item_id): Path<String>,
) -> AppResult<StatusCode> {
    state.inventory.delete(&item_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

fn validate_cost(unit_cost: Option<f64>) -> AppResult<()> {
    match unit_cost {
        Some(cost) if !cost.is_finite() || cost < 0.0 => {
            Err(AppError::validation("unit_cost cannot be negative"))
        }
        _ => Ok(()),
    }
}
