//! Environment-backed configuration.
//!
//! CLI flags cover the per-run knobs (scenario, speed, port, tick rate,
//! transports); this module holds the ambient settings read from the
//! environment, chiefly WebSocket client authentication.

/// WebSocket client authentication settings.
#[derive(Debug, Clone)]
pub struct WsAuthConfig {
    /// Gate WS connections behind a JWT (`WS_AUTH=true`).
    pub enabled: bool,
    pub jwt_secret: String,
    /// Signing algorithm name, HS256 by default.
    pub jwt_algorithm: String,
    /// Cookie carrying the session token.
    pub cookie_name: String,
}

impl WsAuthConfig {
    pub fn from_env() -> Self {
        let enabled = std::env::var("WS_AUTH")
            .map(|v| {
                let v = v.to_lowercase();
                v == "true" || v == "1" || v == "yes"
            })
            .unwrap_or(false);
        Self {
            enabled,
            jwt_secret: std::env::var("JWT_SECRET").unwrap_or_default(),
            jwt_algorithm: std::env::var("JWT_ALGORITHM").unwrap_or_else(|_| "HS256".to_string()),
            cookie_name: std::env::var("COOKIE_NAME")
                .unwrap_or_else(|_| "edge_c2_session".to_string()),
        }
    }

    /// Auth disabled: every client is accepted.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            jwt_secret: String::new(),
            jwt_algorithm: "HS256".to_string(),
            cookie_name: "edge_c2_session".to_string(),
        }
    }
}

/// Application configuration assembled at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub ws_auth: WsAuthConfig,
    /// Geodata directory scanned for GeoJSON zones/routes/landmask.
    pub geodata_path: String,
    /// Users file consumed by the external auth service; carried here so
    /// operators see one consolidated configuration surface.
    pub users_file: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            ws_auth: WsAuthConfig::from_env(),
            geodata_path: std::env::var("COPSIM_GEODATA")
                .unwrap_or_else(|_| "geodata/".to_string()),
            users_file: std::env::var("USERS_FILE").ok(),
        }
    }
}
