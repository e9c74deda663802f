/// Task routes
///
/// CRUD over tasks, each bound to its owning user. Every handler
/// re-verifies the access token via `authenticate` and scopes queries
/// to the token subject. A task that exists but belongs to someone else
/// yields 403, distinct from the 404 for a missing task.

use actix_web::{web, HttpRequest, HttpResponse};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::authenticate;
use crate::configuration::JwtSettings;
use crate::error::{AppError, DatabaseError, ValidationError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
}

impl TaskStatus {
    fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "PENDING",
            TaskStatus::InProgress => "IN_PROGRESS",
            TaskStatus::Completed => "COMPLETED",
        }
    }

    fn parse(s: &str) -> Result<Self, AppError> {
        match s {
            "PENDING" => Ok(TaskStatus::Pending),
            "IN_PROGRESS" => Ok(TaskStatus::InProgress),
            "COMPLETED" => Ok(TaskStatus::Completed),
            other => Err(AppError::Internal(format!(
                "Unknown task status in database: {}",
                other
            ))),
        }
    }
}

#[derive(Deserialize)]
pub struct CreateTaskRequest {
    pub title: String,
    pub description: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateTaskRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<TaskStatus>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskResponse {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub created_at: String,
    pub updated_at: String,
}

type TaskRow = (
    Uuid,
    Uuid,
    String,
    Option<String>,
    String,
    DateTime<Utc>,
    DateTime<Utc>,
);

fn into_response(row: TaskRow) -> Result<TaskResponse, AppError> {
    let (id, user_id, title, description, status, created_at, updated_at) = row;
    Ok(TaskResponse {
        id: id.to_string(),
        user_id: user_id.to_string(),
        title,
        description,
        status: TaskStatus::parse(&status)?,
        created_at: created_at.to_rfc3339(),
        updated_at: updated_at.to_rfc3339(),
    })
}

fn parse_task_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| {
        AppError::Validation(ValidationError::InvalidFormat("Invalid task id".to_string()))
    })
}

/// Fetch a task by id and enforce ownership: 404 when absent, 403 when
/// it belongs to another user.
async fn fetch_owned_task(pool: &PgPool, task_id: Uuid, user_id: Uuid) -> Result<TaskRow, AppError> {
    let row = sqlx::query_as::<_, TaskRow>(
        "SELECT id, user_id, title, description, status, created_at, updated_at FROM tasks WHERE id = $1",
    )
    .bind(task_id)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::Database(DatabaseError::NotFound(
        "Task not found".to_string(),
    )))?;

    if row.1 != user_id {
        return Err(AppError::Ownership("Forbidden".to_string()));
    }

    Ok(row)
}

/// GET /tasks
///
/// List the authenticated user's tasks.
pub async fn list_tasks(
    req: HttpRequest,
    pool: web::Data<PgPool>,
    jwt_config: web::Data<JwtSettings>,
) -> Result<HttpResponse, AppError> {
    let claims = authenticate(&req, jwt_config.get_ref())?;
    let user_id = claims.user_id()?;

    let rows = sqlx::query_as::<_, TaskRow>(
        r#"
        SELECT id, user_id, title, description, status, created_at, updated_at
        FROM tasks
        WHERE user_id = $1
        ORDER BY created_at
        "#,
    )
    .bind(user_id)
    .fetch_all(pool.get_ref())
    .await?;

    let tasks = rows
        .into_iter()
        .map(into_response)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(HttpResponse::Ok().json(tasks))
}

/// POST /tasks
///
/// Create a task owned by the authenticated user.
///
/// # Errors
/// - 400: empty title
pub async fn create_task(
    req: HttpRequest,
    form: web::Json<CreateTaskRequest>,
    pool: web::Data<PgPool>,
    jwt_config: web::Data<JwtSettings>,
) -> Result<HttpResponse, AppError> {
    let claims = authenticate(&req, jwt_config.get_ref())?;
    let user_id = claims.user_id()?;

    let title = form.title.trim();
    if title.is_empty() {
        return Err(AppError::Validation(ValidationError::EmptyField(
            "title".to_string(),
        )));
    }

    let task_id = Uuid::new_v4();
    let now = Utc::now();
    sqlx::query(
        r#"
        INSERT INTO tasks (id, user_id, title, description, status, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(task_id)
    .bind(user_id)
    .bind(title)
    .bind(&form.description)
    .bind(TaskStatus::Pending.as_str())
    .bind(now)
    .bind(now)
    .execute(pool.get_ref())
    .await?;

    tracing::info!(user_id = %user_id, task_id = %task_id, "Task created");

    Ok(HttpResponse::Created().json(TaskResponse {
        id: task_id.to_string(),
        user_id: user_id.to_string(),
        title: title.to_string(),
        description: form.description.clone(),
        status: TaskStatus::Pending,
        created_at: now.to_rfc3339(),
        updated_at: now.to_rfc3339(),
    }))
}

/// GET /tasks/{id}
pub async fn get_task(
    req: HttpRequest,
    path: web::Path<String>,
    pool: web::Data<PgPool>,
    jwt_config: web::Data<JwtSettings>,
) -> Result<HttpResponse, AppError> {
    let claims = authenticate(&req, jwt_config.get_ref())?;
    let user_id = claims.user_id()?;
    let task_id = parse_task_id(&path)?;

    let row = fetch_owned_task(pool.get_ref(), task_id, user_id).await?;
    Ok(HttpResponse::Ok().json(into_response(row)?))
}

/// PUT /tasks/{id}
///
/// Partial update: absent fields keep their current values.
pub async fn update_task(
    req: HttpRequest,
    path: web::Path<String>,
    form: web::Json<UpdateTaskRequest>,
    pool: web::Data<PgPool>,
    jwt_config: web::Data<JwtSettings>,
) -> Result<HttpResponse, AppError> {
    let claims = authenticate(&req, jwt_config.get_ref())?;
    let user_id = claims.user_id()?;
    let task_id = parse_task_id(&path)?;

    let (_, _, title, description, status, created_at, _) =
        fetch_owned_task(pool.get_ref(), task_id, user_id).await?;

    let new_title = form.title.clone().unwrap_or(title);
    let new_description = form.description.clone().or(description);
    let new_status = match form.status {
        Some(s) => s,
        None => TaskStatus::parse(&status)?,
    };
    let updated_at = Utc::now();

    sqlx::query(
        r#"
        UPDATE tasks
        SET title = $1, description = $2, status = $3, updated_at = $4
        WHERE id = $5
        "#,
    )
    .bind(&new_title)
    .bind(&new_description)
    .bind(new_status.as_str())
    .bind(updated_at)
    .bind(task_id)
    .execute(pool.get_ref())
    .await?;

    tracing::info!(user_id = %user_id, task_id = %task_id, "Task updated");

    Ok(HttpResponse::Ok().json(TaskResponse {
        id: task_id.to_string(),
        user_id: user_id.to_string(),
        title: new_title,
        description: new_description,
        status: new_status,
        created_at: created_at.to_rfc3339(),
        updated_at: updated_at.to_rfc3339(),
    }))
}

/// DELETE /tasks/{id}
pub async fn delete_task(
    req: HttpRequest,
    path: web::Path<String>,
    pool: web::Data<PgPool>,
    jwt_config: web::Data<JwtSettings>,
) -> Result<HttpResponse, AppError> {
    let claims = authenticate(&req, jwt_config.get_ref())?;
    let user_id = claims.user_id()?;
    let task_id = parse_task_id(&path)?;

    fetch_owned_task(pool.get_ref(), task_id, user_id).await?;

    sqlx::query("DELETE FROM tasks WHERE id = $1")
        .bind(task_id)
        .execute(pool.get_ref())
        .await?;

    tracing::info!(user_id = %user_id, task_id = %task_id, "Task deleted");

    Ok(HttpResponse::Ok().json(serde_json::json!({ "message": "Task deleted successfully" })))
}
