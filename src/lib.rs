mod auth;
mod config;
mod database;
mod db;
mod error;
mod github;
mod middleware;
mod models;
mod routes;
mod service;

#[cfg(test)]
pub mod test_utils;

pub use config::Config;

use crate::auth::SessionSaver;
use crate::db::stage_db;
use crate::github::GithubClient;
use crate::middleware::RequestLogger;
use rocket::{Build, Rocket, catchers};
use tracing_subscriber::EnvFilter;

fn init_tracing(log_level: &str, json_format: bool) {
    // RUST_LOG overrides the configured level for fine-grained control,
    // e.g. RUST_LOG=info,turbine_console::service=debug
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let subscriber = tracing_subscriber::fmt().with_env_filter(filter).with_target(true).with_line_number(true);

    // try_init: tests build several Rocket instances in one process
    if json_format {
        let _ = subscriber.json().try_init();
    } else {
        let _ = subscriber.try_init();
    }
}

pub fn build_rocket(config: Config) -> Rocket<Build> {
    init_tracing(&config.logging.level, config.logging.json_format);

    let github = GithubClient::new(config.github.clone());

    rocket::build()
        .attach(RequestLogger)
        .attach(SessionSaver)
        .attach(stage_db(config.database))
        .manage(github)
        .mount("/health", routes::health::routes())
        .mount("/github", routes::auth::routes())
        .mount("/console", routes::console::routes())
        .register(
            "/",
            catchers![routes::error::not_found, routes::error::unauthorized, routes::error::internal_error],
        )
}
