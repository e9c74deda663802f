use config::ConfigError;

#[derive(serde::Deserialize, Clone)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub application: ApplicationSettings,
    pub jwt: JwtSettings,
}

#[derive(serde::Deserialize, Clone)]
pub struct ApplicationSettings {
    pub port: u16,
    /// "local" or "production"; controls the Secure attribute of the
    /// refresh cookie.
    pub environment: String,
}

impl ApplicationSettings {
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

#[derive(serde::Deserialize, Clone)]
pub struct DatabaseSettings {
    pub username: String,
    pub password: String,
    pub port: u16,
    pub host: String,
    pub database_name: String,
}

impl DatabaseSettings {
    pub fn connection_string(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.username, self.password, self.host, self.port, self.database_name
        )
    }

    pub fn connection_string_without_db(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}",
            self.username, self.password, self.host, self.port
        )
    }
}

/// JWT authentication settings
#[derive(serde::Deserialize, Clone)]
pub struct JwtSettings {
    pub secret: String,
    pub access_token_expiry: i64,   // seconds (900 = 15 minutes)
    pub refresh_token_expiry: i64,  // seconds (604800 = 7 days)
    pub issuer: String,
}

/// Load settings from `configuration.yaml` plus `APP_`-prefixed environment
/// overrides (e.g. `APP_JWT__SECRET`).
///
/// A missing or empty signing secret is a fatal condition: the session
/// issuer cannot mint tokens without it, so startup must abort.
pub fn get_configuration() -> Result<Settings, ConfigError> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("configuration").required(false))
        .add_source(config::Environment::with_prefix("APP").separator("__"))
        .build()?;
    let settings = settings.try_deserialize::<Settings>()?;

    if settings.jwt.secret.is_empty() {
        return Err(ConfigError::Message(
            "jwt.secret must be set (APP_JWT__SECRET)".to_string(),
        ));
    }

    Ok(settings)
}
