use crate::auth::CurrentUser;
use crate::database::postgres_repository::PostgresRepository;
use crate::error::app_error::AppError;
use crate::github::GithubClient;
use crate::models::installation::Resource;
use crate::service::console::ConsoleService;
use rocket::form::Form;
use rocket::response::Redirect;
use rocket::serde::json::Json;
use rocket::{State, routes};
use serde::Serialize;
use sqlx::PgPool;

#[derive(Debug, Serialize)]
pub struct ConsoleResponse {
    pub email: String,
    pub installations: Vec<Resource>,
}

#[derive(Debug, rocket::FromForm)]
pub struct InstallationStateForm {
    pub installation_id: i64,
    pub state: String,
}

#[rocket::get("/")]
pub async fn console_index(
    pool: &State<PgPool>,
    github: &State<GithubClient>,
    current_user: CurrentUser,
) -> Result<Json<ConsoleResponse>, AppError> {
    let repo = PostgresRepository { pool: pool.inner().clone() };
    let service = ConsoleService::new(&repo, &repo, github.inner());

    let installations = service.list_resources(&current_user.0).await?;

    Ok(Json(ConsoleResponse {
        email: current_user.0.email,
        installations,
    }))
}

#[rocket::post("/installations", data = "<form>")]
pub async fn set_installation_state(
    pool: &State<PgPool>,
    github: &State<GithubClient>,
    current_user: CurrentUser,
    form: Form<InstallationStateForm>,
) -> Result<Redirect, AppError> {
    let repo = PostgresRepository { pool: pool.inner().clone() };
    let service = ConsoleService::new(&repo, &repo, github.inner());

    match form.state.as_str() {
        "enable" => service.enable(&current_user.0, form.installation_id).await?,
        "disable" => service.disable(&current_user.0, form.installation_id).await?,
        _ => return Err(AppError::BadRequest("invalid state".to_string())),
    }

    Ok(Redirect::to("/console"))
}

pub fn routes() -> Vec<rocket::Route> {
    routes![console_index, set_installation_state]
}
