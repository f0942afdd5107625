use axum::{
    extract::{Path, Query, State},
    routing::{delete, get, post, put},
    Json, Router,
};
use uuid::Uuid;

use crate::controllers::car_controller::CarController;
use crate::dto::api::ApiResponse;
use crate::dto::car_dto::{CarFilters, CarResponse, CreateCarRequest, MotHistoryResponse, UpdateCarRequest};
use crate::models::history::HistoryRecord;
use crate::state::AppState;
use crate::utils::errors::AppError;

pub fn create_car_router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_car))
        .route("/", get(list_cars))
        .route("/:id", get(get_car))
        .route("/:id", put(update_car))
        .route("/:id", delete(delete_car))
        .route("/:id/history", get(get_car_history))
        .route("/:id/mot", get(get_car_mot))
}

async fn create_car(
    State(state): State<AppState>,
    Json(request): Json<CreateCarRequest>,
) -> Result<Json<ApiResponse<CarResponse>>, AppError> {
    let controller = CarController::new(state.pool.clone(), &state.config);
    let response = controller.create(request).await?;
    Ok(Json(response))
}

async fn get_car(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<CarResponse>, AppError> {
    let controller = CarController::new(state.pool.clone(), &state.config);
    let response = controller.get_by_id(id).await?;
    Ok(Json(response))
}

async fn list_cars(
    State(state): State<AppState>,
    Query(filters): Query<CarFilters>,
) -> Result<Json<Vec<CarResponse>>, AppError> {
    let controller = CarController::new(state.pool.clone(), &state.config);
    let response = controller.list(filters).await?;
    Ok(Json(response))
}

async fn update_car(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateCarRequest>,
) -> Result<Json<ApiResponse<CarResponse>>, AppError> {
    let controller = CarController::new(state.pool.clone(), &state.config);
    let response = controller.update(id, request).await?;
    Ok(Json(response))
}

async fn delete_car(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    let controller = CarController::new(state.pool.clone(), &state.config);
    controller.delete(id).await?;
    Ok(Json(serde_json::json!({
        "success": true,
        "message": "Car deleted successfully"
    })))
}

async fn get_car_history(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<HistoryRecord>, AppError> {
    let controller = CarController::new(state.pool.clone(), &state.config);
    let response = controller.get_history(id).await?;
    Ok(Json(response))
}

async fn get_car_mot(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<MotHistoryResponse>, AppError> {
    let controller = CarController::new(state.pool.clone(), &state.config);
    let response = controller.get_mot(id).await?;
    Ok(Json(response))
}
