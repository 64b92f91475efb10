use std::env;
use std::str::FromStr;
use std::{fs::File, net::SocketAddr};

use axum::http::HeaderValue;
use axum_server::tls_openssl::OpenSSLConfig;
use dotenv::dotenv;
use log::{LevelFilter, warn};
use simplelog::{ColorChoice, CombinedLogger, TermLogger, TerminalMode, WriteLogger};
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin};

pub mod db;
pub mod pubsub;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid storage: {0}")]
    InvalidStorage(String),

    #[error(transparent)]
    _Env(#[from] env::VarError),
    #[error(transparent)]
    _ParseInt(#[from] std::num::ParseIntError),
    #[error(transparent)]
    _R2d2(#[from] r2d2::Error),
}

#[derive(Clone)]
pub enum Env {
    Local,
    Dev,
    Stage,
    Production,
}

impl Env {
    pub fn addr(&self) -> SocketAddr {
        let port = env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(match self {
                Env::Production => 8443,
                _ => 8000,
            });

        match self {
            Env::Local => SocketAddr::from(([127, 0, 0, 1], port)),
            Env::Dev | Env::Stage | Env::Production => SocketAddr::from(([0, 0, 0, 0], port)),
        }
    }

    pub fn ssl_config(&self) -> Option<OpenSSLConfig> {
        match self {
            Env::Local | Env::Dev | Env::Stage => None,
            Env::Production => {
                let ssl_config = OpenSSLConfig::from_pem_file(
                    env::var("SSL_CERT_FILE").expect("SSL_CERT_FILE must be set"),
                    env::var("SSL_KEY_FILE").expect("SSL_KEY_FILE must be set"),
                )
                .expect("cert should be present and have read permission");
                Some(ssl_config)
            }
        }
    }

    pub fn allow_origin(&self) -> AllowOrigin {
        match self {
            Env::Local | Env::Dev => AllowOrigin::any(),
            Env::Stage | Env::Production => {
                let origins = env::var("ALLOW_ORIGIN")
                    .expect("ALLOW_ORIGIN must be set")
                    .split(',')
                    .map(HeaderValue::from_str)
                    .map(|r| r.expect("invalid ALLOW_ORIGIN value"))
                    .collect::<Vec<HeaderValue>>();
                AllowOrigin::list(origins)
            }
        }
    }

    pub fn allow_methods(&self) -> AllowMethods {
        AllowMethods::any()
    }

    pub fn allow_headers(&self) -> AllowHeaders {
        AllowHeaders::any()
    }
}

impl FromStr for Env {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "local" => Ok(Env::Local),
            "dev" => Ok(Env::Dev),
            "stg" => Ok(Env::Stage),
            "prod" => Ok(Env::Production),
            _ => Err(format!("Invalid environment: {s}")),
        }
    }
}

#[derive(Clone)]
pub enum Storage {
    Postgres(db::Config),
    Memory,
}

impl Storage {
    pub fn env() -> Result<Self> {
        match env::var("STORAGE").unwrap_or("postgres".into()).as_str() {
            "postgres" => Ok(Storage::Postgres(db::Config::env().unwrap_or_else(|e| {
                warn!("Postgres env is not fully configured, using defaults: {e}");
                db::Config::default()
            }))),
            "memory" => Ok(Storage::Memory),
            other => Err(Error::InvalidStorage(other.to_owned())),
        }
    }
}

#[derive(Clone)]
pub struct Config {
    pub env: Env,

    pub storage: Storage,
    pub pubsub: Option<pubsub::Config>,

    pub jwt_secret: String,
}

impl Default for Config {
    fn default() -> Self {
        dotenv().ok();

        let rust_log = env::var("RUST_LOG").unwrap_or("info".into());
        let level = LevelFilter::from_str(&rust_log).unwrap_or(LevelFilter::Info);
        let log_file = env::var("SERVICE_NAME")
            .map(|pkg| format!("{pkg}.log"))
            .unwrap_or("service.log".into());

        CombinedLogger::init(vec![
            TermLogger::new(
                level,
                simplelog::Config::default(),
                TerminalMode::Mixed,
                ColorChoice::Auto,
            ),
            WriteLogger::new(
                level,
                simplelog::Config::default(),
                File::create(log_file).expect("Failed to create log file"),
            ),
        ])
        .expect("Failed to initialize logger");

        let env = env::var("ENV")
            .map(|env| Env::from_str(&env).unwrap_or_else(|e| panic!("{e}")))
            .unwrap_or(Env::Local);

        let storage = match Storage::env() {
            Ok(storage) => storage,
            Err(e) => panic!("Failed to configure storage: {e}"),
        };

        Self {
            env,
            storage,
            pubsub: pubsub::Config::env(),
            jwt_secret: env::var("JWT_SECRET").expect("JWT_SECRET must be set"),
        }
    }
}
