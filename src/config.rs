use std::env;

/// AppConfig
///
/// Holds the service's entire configuration state. Loaded once at startup and
/// shared immutably with every handler through `FromRef<AppState>`.
#[derive(Clone, Debug)]
pub struct AppConfig {
    // Runtime environment marker. Controls the local identity override and log format.
    pub env: Env,
    // Postgres connection string. `None` runs the service on the in-memory store.
    pub db_url: Option<String>,
    // Address the HTTP listener binds to.
    pub bind_addr: String,
    // HMAC secret used to sign and verify session tokens.
    pub jwt_secret: String,
    // Lifetime of an issued session token.
    pub token_ttl_hours: i64,
    // bcrypt work factor for password hashes.
    pub bcrypt_cost: u32,
    // Base URL of the web client; verification and reset links point here.
    pub frontend_url: String,
    // Origin allowed by the CORS layer. `None` allows any origin.
    pub cors_origin: Option<String>,
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_user: String,
    pub smtp_pass: String,
    // Sender address on outgoing mail.
    pub mail_from: String,
    // S3-compatible storage for thesis documents.
    pub s3_endpoint: String,
    pub s3_region: String,
    pub s3_key: String,
    pub s3_secret: String,
    pub s3_bucket: String,
}

/// Env
///
/// Runtime context. `Local` enables development conveniences (pretty logs,
/// the `x-user-id` override, bucket provisioning); `Production` disables them.
#[derive(Clone, PartialEq, Debug)]
pub enum Env {
    Local,
    Production,
}

/// Work factors bcrypt accepts.
pub const BCRYPT_COST_RANGE: std::ops::RangeInclusive<u32> = 4..=31;

pub const LOCAL_JWT_SECRET: &str = "scholar-vault-local-development-secret";

impl Default for AppConfig {
    /// Safe, non-panicking values for test state scaffolding.
    fn default() -> Self {
        Self {
            env: Env::Local,
            db_url: None,
            bind_addr: "127.0.0.1:3000".to_string(),
            jwt_secret: LOCAL_JWT_SECRET.to_string(),
            token_ttl_hours: 24,
            bcrypt_cost: 4,
            frontend_url: "http://localhost:5173".to_string(),
            cors_origin: None,
            smtp_host: "localhost".to_string(),
            smtp_port: 1025,
            smtp_user: String::new(),
            smtp_pass: String::new(),
            mail_from: "no-reply@scholarvault.local".to_string(),
            s3_endpoint: "http://localhost:9000".to_string(),
            s3_region: "us-east-1".to_string(),
            s3_key: "admin".to_string(),
            s3_secret: "password".to_string(),
            s3_bucket: "scholar-vault-test".to_string(),
        }
    }
}

impl AppConfig {
    /// load
    ///
    /// Reads every parameter from the environment and fails fast.
    ///
    /// # Panics
    /// Panics when a secret required in production (`JWT_SECRET`, `DATABASE_URL`,
    /// SMTP and S3 credentials) is missing, or when `BCRYPT_COST` is set outside 4..=31.
    pub fn load() -> Self {
        let env = match env::var("APP_ENV").unwrap_or_default().as_str() {
            "production" => Env::Production,
            _ => Env::Local,
        };

        let token_ttl_hours = env::var("TOKEN_TTL_HOURS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(24);
        let bcrypt_cost = match env::var("BCRYPT_COST") {
            Ok(raw) => raw
                .trim()
                .parse::<u32>()
                .ok()
                .filter(|cost| BCRYPT_COST_RANGE.contains(cost))
                .expect("FATAL: BCRYPT_COST must be an integer between 4 and 31"),
            Err(_) => bcrypt::DEFAULT_COST,
        };
        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let frontend_url =
            env::var("FRONTEND_URL").unwrap_or_else(|_| "http://localhost:5173".to_string());
        let cors_origin = env::var("CORS_ORIGIN").ok();
        let smtp_port = env::var("SMTP_PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(465);

        match env {
            Env::Local => Self {
                env: Env::Local,
                // Local runs fall back to the in-memory store when no database is configured.
                db_url: env::var("DATABASE_URL").ok(),
                bind_addr,
                jwt_secret: env::var("JWT_SECRET")
                    .unwrap_or_else(|_| LOCAL_JWT_SECRET.to_string()),
                token_ttl_hours,
                bcrypt_cost,
                frontend_url,
                cors_origin,
                smtp_host: env::var("SMTP_HOST").unwrap_or_else(|_| "localhost".to_string()),
                smtp_port: env::var("SMTP_PORT")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(1025),
                smtp_user: env::var("SMTP_USER").unwrap_or_default(),
                smtp_pass: env::var("SMTP_PASS").unwrap_or_default(),
                mail_from: env::var("MAIL_FROM")
                    .unwrap_or_else(|_| "no-reply@scholarvault.local".to_string()),
                // MinIO defaults from the docker setup.
                s3_endpoint: "http://localhost:9000".to_string(),
                s3_region: "us-east-1".to_string(),
                s3_key: "admin".to_string(),
                s3_secret: "password".to_string(),
                s3_bucket: "scholar-vault".to_string(),
            },
            Env::Production => Self {
                env: Env::Production,
                db_url: Some(
                    env::var("DATABASE_URL").expect("FATAL: DATABASE_URL required in prod"),
                ),
                bind_addr,
                jwt_secret: env::var("JWT_SECRET").expect("FATAL: JWT_SECRET required in prod"),
                token_ttl_hours,
                bcrypt_cost,
                frontend_url,
                cors_origin,
                smtp_host: env::var("SMTP_HOST").expect("FATAL: SMTP_HOST required in prod"),
                smtp_port,
                smtp_user: env::var("SMTP_USER").expect("FATAL: SMTP_USER required in prod"),
                smtp_pass: env::var("SMTP_PASS").expect("FATAL: SMTP_PASS required in prod"),
                mail_from: env::var("MAIL_FROM")
                    .unwrap_or_else(|_| "no-reply@scholarvault.com".to_string()),
                s3_endpoint: env::var("S3_ENDPOINT").expect("FATAL: S3_ENDPOINT required in prod"),
                s3_region: env::var("S3_REGION").unwrap_or_else(|_| "us-east-1".to_string()),
                s3_key: env::var("S3_ACCESS_KEY").expect("FATAL: S3_ACCESS_KEY required in prod"),
                s3_secret: env::var("S3_SECRET_KEY")
                    .expect("FATAL: S3_SECRET_KEY required in prod"),
                s3_bucket: env::var("S3_BUCKET_NAME")
                    .unwrap_or_else(|_| "scholar-vault".to_string()),
            },
        }
    }
}
