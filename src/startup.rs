use actix_web::dev::Server;
use actix_web::{middleware::Logger, web, App, HttpServer};
use sqlx::PgPool;
use std::net::TcpListener;

use crate::configuration::Settings;
use crate::routes::{
    create_task, delete_task, get_current_user, get_task, health_check, list_tasks, login, logout,
    refresh, register, update_task,
};

pub fn run(
    listener: TcpListener,
    connection: PgPool,
    settings: Settings,
) -> Result<Server, std::io::Error> {
    let connection = web::Data::new(connection);
    let jwt_config = web::Data::new(settings.jwt.clone());
    let app_config = web::Data::new(settings.application.clone());

    let server = HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            // Shared state
            .app_data(connection.clone())
            .app_data(jwt_config.clone())
            .app_data(app_config.clone())
            // Public routes (no access token required)
            .route("/health_check", web::get().to(health_check))
            .route("/auth/register", web::post().to(register))
            .route("/auth/login", web::post().to(login))
            .route("/auth/refresh", web::post().to(refresh))
            .route("/auth/logout", web::post().to(logout))
            // Protected routes - each handler runs `authenticate` itself
            .route("/auth/me", web::get().to(get_current_user))
            .route("/tasks", web::get().to(list_tasks))
            .route("/tasks", web::post().to(create_task))
            .route("/tasks/{id}", web::get().to(get_task))
            .route("/tasks/{id}", web::put().to(update_task))
            .route("/tasks/{id}", web::delete().to(delete_task))
    })
    .listen(listener)?
    .run();

    Ok(server)
}
