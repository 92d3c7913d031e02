use shared_types::{AppConfig, FeatureFlags};
use std::sync::OnceLock;
use std::time::Duration;

static FLAGS: OnceLock<FeatureFlags> = OnceLock::new();

/// Default config file path, relative to the working directory.
const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// Read `config.toml` (or `CONFIG_PATH`), parse feature flags, and store them
/// in the global `OnceLock`. Only the first call has effect.
///
/// If the file is missing or unparseable, all flags default to `false`.
pub fn load_feature_flags() -> &'static FeatureFlags {
    FLAGS.get_or_init(|| {
        let path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        match std::fs::read_to_string(&path) {
            Ok(contents) => {
                let config: AppConfig = toml::from_str(&contents).unwrap_or_else(|e| {
                    tracing::warn!(%path, error = %e, "Failed to parse config file, all features off");
                    AppConfig::default()
                });
                tracing::info!(features = ?config.features, "Feature flags loaded");
                config.features
            }
            Err(e) => {
                tracing::info!(%path, error = %e, "No config file, all features off");
                FeatureFlags::default()
            }
        }
    })
}

/// Loaded feature flags, or all-false defaults before `load_feature_flags()`.
pub fn feature_flags() -> &'static FeatureFlags {
    static DEFAULT: FeatureFlags = FeatureFlags {
        telemetry: false,
        change_webhook: false,
        static_site: false,
        docs: false,
    };
    FLAGS.get().unwrap_or(&DEFAULT)
}

/// Which apply procedure the backend exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyProcedure {
    V1,
    V2,
}

impl ApplyProcedure {
    pub fn name(&self) -> &'static str {
        match self {
            ApplyProcedure::V1 => "apply_and_notify",
            ApplyProcedure::V2 => "apply_and_notify_v2",
        }
    }

    fn parse(value: &str) -> Self {
        match value.trim() {
            "apply_and_notify" | "v1" => ApplyProcedure::V1,
            _ => ApplyProcedure::V2,
        }
    }
}

/// Runtime settings read from the environment.
#[derive(Debug, Clone)]
pub struct PortalConfig {
    /// Base URL of the hosted backend (`https://xyz.supabase.co`).
    pub backend_url: String,
    /// Public anon key sent as `apikey` on every request.
    pub anon_key: String,
    /// Service role key, used only to refresh cached state from change events.
    pub service_key: Option<String>,
    /// HS256 secret for validating backend access tokens locally.
    pub jwt_secret: Option<String>,
    pub backend_timeout: Duration,
    /// Shared secret for database change webhooks.
    pub webhook_secret: Option<String>,
    /// Public origin of the portal, used in password reset links.
    pub app_base_url: String,
    pub port: u16,
    pub static_dir: Option<String>,
    pub cookie_secure: bool,
    pub cookie_domain: Option<String>,
    pub professor_email_domain: String,
    pub student_email_domain: String,
    pub apply_procedure: ApplyProcedure,
}

impl PortalConfig {
    /// Load from process environment, after `.env` if present.
    pub fn from_env() -> Result<Self, String> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let first = |keys: &[&str]| keys.iter().find_map(|k| get(k));

        let backend_url = first(&["BACKEND_URL", "NEXT_PUBLIC_SUPABASE_URL"])
            .ok_or("BACKEND_URL must be set")?
            .trim_end_matches('/')
            .to_string();
        let anon_key = first(&["BACKEND_ANON_KEY", "NEXT_PUBLIC_SUPABASE_ANON_KEY"])
            .ok_or("BACKEND_ANON_KEY must be set")?;

        let backend_timeout = get("BACKEND_TIMEOUT_SECS")
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(15));

        let port = match get("PORT") {
            Some(v) => v.parse().map_err(|e| format!("PORT is not a valid port: {e}"))?,
            None => 3000,
        };

        Ok(Self {
            backend_url,
            anon_key,
            service_key: get("BACKEND_SERVICE_KEY"),
            jwt_secret: get("BACKEND_JWT_SECRET"),
            backend_timeout,
            webhook_secret: get("WEBHOOK_SECRET"),
            app_base_url: get("APP_BASE_URL")
                .unwrap_or_else(|| format!("http://localhost:{port}"))
                .trim_end_matches('/')
                .to_string(),
            port,
            static_dir: get("STATIC_DIR"),
            cookie_secure: get("COOKIE_SECURE")
                .and_then(|v| v.parse().ok())
                .unwrap_or(false),
            cookie_domain: get("COOKIE_DOMAIN"),
            professor_email_domain: get("PROFESSOR_EMAIL_DOMAIN")
                .unwrap_or_else(|| "@uacj.mx".to_string()),
            student_email_domain: get("STUDENT_EMAIL_DOMAIN")
                .unwrap_or_else(|| "@alumnos.uacj.mx".to_string()),
            apply_procedure: get("APPLY_RPC")
                .map(|v| ApplyProcedure::parse(&v))
                .unwrap_or(ApplyProcedure::V2),
        })
    }

    /// Settings for tests and local tooling that never reach a real backend.
    pub fn for_tests() -> Self {
        Self {
            backend_url: "http://backend.invalid".to_string(),
            anon_key: "anon".to_string(),
            service_key: None,
            jwt_secret: None,
            backend_timeout: Duration::from_secs(5),
            webhook_secret: None,
            app_base_url: "http://localhost:3000".to_string(),
            port: 3000,
            static_dir: None,
            cookie_secure: false,
            cookie_domain: None,
            professor_email_domain: "@uacj.mx".to_string(),
            student_email_domain: "@alumnos.uacj.mx".to_string(),
            apply_procedure: ApplyProcedure::V2,
        }
    }
}
