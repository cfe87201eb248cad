#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub jwt_maxage: i64,
    pub port: u16,
    pub media_root: String,
    pub frontend_url: String,
}

impl Config {
    /// Read configuration from the environment (after `dotenv()` has run).
    ///
    /// `DATABASE_URL` and `JWT_SECRET_KEY` are required; the process cannot
    /// serve anything without them.
    pub fn init() -> Config {
        let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        let jwt_secret = std::env::var("JWT_SECRET_KEY").expect("JWT_SECRET_KEY must be set");
        let jwt_maxage = env_or("JWT_MAXAGE", "86400")
            .parse::<i64>()
            .expect("JWT_MAXAGE must be a number of seconds");
        let port = env_or("PORT", "8000")
            .parse::<u16>()
            .expect("PORT must be a valid port number");
        let media_root = env_or("MEDIA_ROOT", "./media");
        let frontend_url = env_or("FRONTEND_URL", "http://localhost:8000");

        Config {
            database_url,
            jwt_secret,
            jwt_maxage,
            port,
            media_root,
            frontend_url,
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
