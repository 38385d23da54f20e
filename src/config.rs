use std::env;

#[derive(Clone)]
pub struct Config {
    pub database_path: String,
    pub frontend_origin: String,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();

        Self {
            database_path: env::var("DATABASE_PATH").unwrap_or_else(|_| "issues.db".to_string()),
            frontend_origin: env::var("FRONTEND_ORIGIN")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
        }
    }
}
