// src/main.rs

mod app_state;
mod config;
mod issue;
mod issue_db;
mod models;

use std::path::Path;
use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{http, middleware::Logger, web, App, HttpServer};
use env_logger::Env;

use crate::app_state::AppState;
use crate::issue_db::Database;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let config = config::Config::from_env();

    // Schema creation and seeding happen here, before the server starts
    // accepting connections.
    let db = Arc::new(
        Database::open(Path::new(&config.database_path)).expect("Failed to initialize database"),
    );

    let frontend_origin = config.frontend_origin.clone();

    println!("Server running at http://0.0.0.0:8080");
    println!("Allowed CORS Origin: {}", frontend_origin);

    HttpServer::new(move || {
        let cors = Cors::default()
            .allowed_origin(&frontend_origin)
            .allowed_methods(vec!["GET", "POST", "PUT", "OPTIONS"])
            .allowed_headers(vec![http::header::CONTENT_TYPE, http::header::ACCEPT])
            .max_age(3600);

        App::new()
            .wrap(Logger::default())
            .wrap(cors)
            .app_data(web::Data::new(AppState { db: db.clone() }))
            .configure(issue::config)
    })
    .bind("0.0.0.0:8080")?
    .run()
    .await
}
