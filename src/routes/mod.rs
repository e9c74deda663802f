mod auth;
mod health_check;
mod tasks;

pub use auth::{get_current_user, login, logout, refresh, register, REFRESH_COOKIE};
pub use health_check::health_check;
pub use tasks::{create_task, delete_task, get_task, list_tasks, update_task, TaskStatus};
