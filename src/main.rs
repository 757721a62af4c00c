use turbine_console::Config;

#[rocket::launch]
fn rocket() -> _ {
    dotenvy::dotenv().ok();

    let config = Config::load().expect("could not load configuration");
    turbine_console::build_rocket(config)
}
