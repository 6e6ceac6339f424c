use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use arena_auth::OidcConfig;

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub bind_addr: SocketAddr,
    pub organization_id: i32,
    pub snapshot_path: PathBuf,
    pub public_base_url: String,
    pub default_format: WireFormat,
    pub auth_mode: AuthMode,
    pub local_auth_shared_secret: Option<String>,
    pub oidc: Option<OidcConfig>,
    pub rate_limit_window_secs: u64,
    pub rate_limit_client_validate_per_window: u32,
    pub max_body_bytes: usize,
    pub metrics_require_auth: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    Local,
    Oidc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireFormat {
    Json,
    Xml,
}

impl WireFormat {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "json" => Some(WireFormat::Json),
            "xml" => Some(WireFormat::Xml),
            _ => None,
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            WireFormat::Json => "application/json",
            WireFormat::Xml => "application/xml; charset=utf-8",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartupError {
    pub code: &'static str,
    pub message: String,
}

impl std::fmt::Display for StartupError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for StartupError {}

impl GatewayConfig {
    pub fn load() -> Result<Self, StartupError> {
        let mut merged = HashMap::new();

        if let Ok(config_path) = std::env::var("ARENA_CONFIG_PATH") {
            let config_path = config_path.trim();
            if !config_path.is_empty() {
                let file_kv = parse_env_file(config_path)?;
                merged.extend(file_kv);
            }
        }

        merged.extend(std::env::vars());

        Self::from_kv(&merged)
    }

    pub fn from_kv(kv: &HashMap<String, String>) -> Result<Self, StartupError> {
        let bind_addr = parse_socket_addr(
            kv.get("ARENA_BIND_ADDR"),
            SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 8080),
            "ARENA_BIND_ADDR",
        )?;

        let auth_mode = parse_auth_mode(kv.get("ARENA_AUTH_MODE"))?;

        let dev_allow_nonlocal_bind =
            parse_bool(kv.get("ARENA_DEV_ALLOW_NONLOCAL_BIND")).unwrap_or(false);

        if !bind_addr.ip().is_loopback()
            && auth_mode != AuthMode::Oidc
            && !(dev_allow_nonlocal_bind && is_unspecified_ip(bind_addr.ip()))
        {
            return Err(StartupError {
                code: "ERR_NONLOCAL_BIND_REQUIRES_AUTH",
                message: "non-local bind requires oidc auth mode; refuse startup".to_string(),
            });
        }

        let organization_id = parse_number::<u32>(
            kv.get("ARENA_ORGANIZATION_ID"),
            1,
            "ARENA_ORGANIZATION_ID",
        )?;
        let organization_id = i32::try_from(organization_id)
            .ok()
            .filter(|id| *id > 0)
            .ok_or_else(|| StartupError {
                code: "ERR_INVALID_CONFIG",
                message: "ARENA_ORGANIZATION_ID must be a positive 32-bit integer".to_string(),
            })?;

        let snapshot_path = PathBuf::from(require_nonempty(kv, "ARENA_SNAPSHOT_PATH")?);

        let public_base_url = optional_nonempty(kv, "ARENA_PUBLIC_BASE_URL")
            .unwrap_or_else(|| "http://localhost:8080".to_string());
        if !public_base_url.starts_with("http://") && !public_base_url.starts_with("https://") {
            return Err(StartupError {
                code: "ERR_INVALID_CONFIG",
                message: "ARENA_PUBLIC_BASE_URL must be an http(s) URL".to_string(),
            });
        }
        let public_base_url = public_base_url.trim_end_matches('/').to_string();

        let default_format = match optional_nonempty(kv, "ARENA_DEFAULT_FORMAT") {
            None => WireFormat::Json,
            Some(raw) => WireFormat::parse(&raw).ok_or_else(|| StartupError {
                code: "ERR_INVALID_CONFIG",
                message: "ARENA_DEFAULT_FORMAT must be json or xml".to_string(),
            })?,
        };

        let local_auth_shared_secret = optional_nonempty(kv, "ARENA_LOCAL_AUTH_SHARED_SECRET");

        let oidc = if auth_mode == AuthMode::Oidc {
            Some(parse_oidc_config(kv)?)
        } else {
            None
        };

        let rate_limit_window_secs = parse_number::<u64>(
            kv.get("ARENA_RATE_LIMIT_WINDOW_SECS"),
            60,
            "ARENA_RATE_LIMIT_WINDOW_SECS",
        )?;
        let rate_limit_client_validate_per_window = parse_number::<u32>(
            kv.get("ARENA_RATE_LIMIT_CLIENT_VALIDATE_PER_WINDOW"),
            30,
            "ARENA_RATE_LIMIT_CLIENT_VALIDATE_PER_WINDOW",
        )?;

        let max_body_bytes = parse_number::<usize>(
            kv.get("ARENA_MAX_BODY_BYTES"),
            1024 * 1024,
            "ARENA_MAX_BODY_BYTES",
        )?;
        if max_body_bytes == 0 {
            return Err(StartupError {
                code: "ERR_INVALID_CONFIG",
                message: "ARENA_MAX_BODY_BYTES must be >= 1".to_string(),
            });
        }

        let metrics_require_auth =
            parse_bool(kv.get("ARENA_METRICS_REQUIRE_AUTH")).unwrap_or(false);

        Ok(Self {
            bind_addr,
            organization_id,
            snapshot_path,
            public_base_url,
            default_format,
            auth_mode,
            local_auth_shared_secret,
            oidc,
            rate_limit_window_secs,
            rate_limit_client_validate_per_window,
            max_body_bytes,
            metrics_require_auth,
        })
    }
}

fn parse_env_file(path: &str) -> Result<HashMap<String, String>, StartupError> {
    let contents = std::fs::read_to_string(path).map_err(|_| StartupError {
        code: "ERR_CONFIG_FILE_READ",
        message: format!("failed to read config file at {}", path),
    })?;

    let mut kv = HashMap::new();

    for (idx, raw_line) in contents.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let (key, value) = line.split_once('=').ok_or_else(|| StartupError {
            code: "ERR_CONFIG_FILE_PARSE",
            message: format!("invalid config line {} (expected KEY=VALUE)", idx + 1),
        })?;

        let key = key.trim();
        if key.is_empty() {
            return Err(StartupError {
                code: "ERR_CONFIG_FILE_PARSE",
                message: format!("invalid config line {} (empty key)", idx + 1),
            });
        }

        kv.insert(key.to_string(), strip_quotes(value.trim()));
    }

    Ok(kv)
}

fn strip_quotes(s: &str) -> String {
    let bytes = s.as_bytes();
    if bytes.len() >= 2 {
        let first = bytes[0];
        let last = bytes[bytes.len() - 1];
        if (first == b'"' && last == b'"') || (first == b'\'' && last == b'\'') {
            return s[1..bytes.len() - 1].to_string();
        }
    }
    s.to_string()
}

fn optional_nonempty(kv: &HashMap<String, String>, key: &str) -> Option<String> {
    kv.get(key)
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}

fn require_nonempty(
    kv: &HashMap<String, String>,
    key: &'static str,
) -> Result<String, StartupError> {
    optional_nonempty(kv, key).ok_or_else(|| StartupError {
        code: "ERR_MISSING_CONFIG",
        message: format!("missing required config key {}", key),
    })
}

fn parse_socket_addr(
    value: Option<&String>,
    default: SocketAddr,
    key: &'static str,
) -> Result<SocketAddr, StartupError> {
    match value {
        None => Ok(default),
        Some(v) => v.trim().parse::<SocketAddr>().map_err(|_| StartupError {
            code: "ERR_INVALID_CONFIG",
            message: format!("{} must be a valid host:port socket address", key),
        }),
    }
}

/// Blank values fall back to `default`; anything else must parse as `T`.
fn parse_number<T: std::str::FromStr>(
    value: Option<&String>,
    default: T,
    key: &'static str,
) -> Result<T, StartupError> {
    match value.map(|v| v.trim()).filter(|v| !v.is_empty()) {
        None => Ok(default),
        Some(v) => v.parse::<T>().map_err(|_| StartupError {
            code: "ERR_INVALID_CONFIG",
            message: format!("{} must be a non-negative integer", key),
        }),
    }
}

fn parse_auth_mode(value: Option<&String>) -> Result<AuthMode, StartupError> {
    let mode = value
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .unwrap_or("local");

    match mode {
        "local" => Ok(AuthMode::Local),
        "oidc" => Ok(AuthMode::Oidc),
        _ => Err(StartupError {
            code: "ERR_INVALID_CONFIG",
            message: "ARENA_AUTH_MODE must be local or oidc".to_string(),
        }),
    }
}

fn parse_oidc_config(kv: &HashMap<String, String>) -> Result<OidcConfig, StartupError> {
    let issuer = require_nonempty(kv, "ARENA_OIDC_ISSUER")?;

    let jwks_json = optional_nonempty(kv, "ARENA_OIDC_JWKS_JSON");
    let jwks_url = optional_nonempty(kv, "ARENA_OIDC_JWKS_URL");

    if jwks_json.is_none() && jwks_url.is_none() {
        return Err(StartupError {
            code: "ERR_INVALID_CONFIG",
            message: "oidc requires ARENA_OIDC_JWKS_URL or ARENA_OIDC_JWKS_JSON".to_string(),
        });
    }

    let audience = optional_nonempty(kv, "ARENA_OIDC_AUDIENCE");
    let login_id_claim =
        optional_nonempty(kv, "ARENA_OIDC_LOGIN_ID_CLAIM").unwrap_or_else(|| "sub".to_string());
    let person_id_claim = optional_nonempty(kv, "ARENA_OIDC_PERSON_ID_CLAIM")
        .unwrap_or_else(|| "person_id".to_string());

    let jwks_timeout_ms = parse_number::<u64>(
        kv.get("ARENA_OIDC_JWKS_TIMEOUT_MS"),
        2000,
        "ARENA_OIDC_JWKS_TIMEOUT_MS",
    )?;
    let jwks_refresh_ttl_secs = parse_number::<u64>(
        kv.get("ARENA_OIDC_JWKS_REFRESH_TTL_SECS"),
        300,
        "ARENA_OIDC_JWKS_REFRESH_TTL_SECS",
    )?;
    let clock_skew_secs = parse_number::<u64>(
        kv.get("ARENA_OIDC_CLOCK_SKEW_SECS"),
        60,
        "ARENA_OIDC_CLOCK_SKEW_SECS",
    )?;

    Ok(OidcConfig {
        issuer,
        audience,
        jwks_url,
        jwks_json,
        jwks_timeout: Duration::from_millis(jwks_timeout_ms),
        jwks_refresh_ttl: Duration::from_secs(jwks_refresh_ttl_secs),
        clock_skew: Duration::from_secs(clock_skew_secs),
        login_id_claim,
        person_id_claim,
    })
}

fn parse_bool(value: Option<&String>) -> Option<bool> {
    let value = value.map(|v| v.trim()).filter(|v| !v.is_empty())?;

    match value {
        "1" | "true" | "TRUE" | "yes" | "YES" => Some(true),
        "0" | "false" | "FALSE" | "no" | "NO" => Some(false),
        _ => None,
    }
}

fn is_unspecified_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4.is_unspecified(),
        IpAddr::V6(v6) => v6.is_unspecified(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_ok_env() -> HashMap<String, String> {
        HashMap::from([(
            "ARENA_SNAPSHOT_PATH".to_string(),
            "fixtures/arena_snapshot.json".to_string(),
        )])
    }

    #[test]
    fn defaults_apply_when_only_snapshot_is_set() {
        let cfg = GatewayConfig::from_kv(&minimal_ok_env()).expect("config should parse");
        assert_eq!(cfg.organization_id, 1);
        assert_eq!(cfg.default_format, WireFormat::Json);
        assert_eq!(cfg.auth_mode, AuthMode::Local);
        assert_eq!(cfg.public_base_url, "http://localhost:8080");
        assert_eq!(cfg.rate_limit_client_validate_per_window, 30);
        assert_eq!(cfg.max_body_bytes, 1024 * 1024);
        assert!(cfg.oidc.is_none());
    }

    #[test]
    fn missing_snapshot_path_fails() {
        let err = GatewayConfig::from_kv(&HashMap::new()).unwrap_err();
        assert_eq!(err.code, "ERR_MISSING_CONFIG");
    }

    #[test]
    fn non_local_bind_without_auth_config_fails() {
        let mut env = minimal_ok_env();
        env.insert("ARENA_BIND_ADDR".to_string(), "10.1.2.3:8080".to_string());
        let err = GatewayConfig::from_kv(&env).unwrap_err();
        assert_eq!(err.code, "ERR_NONLOCAL_BIND_REQUIRES_AUTH");

        env.insert("ARENA_BIND_ADDR".to_string(), "0.0.0.0:8080".to_string());
        env.insert(
            "ARENA_DEV_ALLOW_NONLOCAL_BIND".to_string(),
            "true".to_string(),
        );
        assert!(GatewayConfig::from_kv(&env).is_ok());
    }

    #[test]
    fn organization_id_must_be_positive() {
        let mut env = minimal_ok_env();
        env.insert("ARENA_ORGANIZATION_ID".to_string(), "0".to_string());
        let err = GatewayConfig::from_kv(&env).unwrap_err();
        assert_eq!(err.code, "ERR_INVALID_CONFIG");
    }

    #[test]
    fn oidc_requires_jwks_source_and_defaults_claims() {
        let mut env = minimal_ok_env();
        env.insert("ARENA_AUTH_MODE".to_string(), "oidc".to_string());
        env.insert(
            "ARENA_OIDC_ISSUER".to_string(),
            "https://issuer.example".to_string(),
        );
        let err = GatewayConfig::from_kv(&env).unwrap_err();
        assert_eq!(err.code, "ERR_INVALID_CONFIG");

        env.insert(
            "ARENA_OIDC_JWKS_URL".to_string(),
            "https://issuer.example/jwks".to_string(),
        );
        let cfg = GatewayConfig::from_kv(&env).expect("oidc config should parse");
        let oidc = cfg.oidc.expect("oidc config present");
        assert_eq!(oidc.login_id_claim, "sub");
        assert_eq!(oidc.person_id_claim, "person_id");
    }

    #[test]
    fn default_format_and_base_url_are_validated() {
        let mut env = minimal_ok_env();
        env.insert("ARENA_DEFAULT_FORMAT".to_string(), "XML".to_string());
        env.insert(
            "ARENA_PUBLIC_BASE_URL".to_string(),
            "https://arena.example.org/api/".to_string(),
        );
        let cfg = GatewayConfig::from_kv(&env).expect("config should parse");
        assert_eq!(cfg.default_format, WireFormat::Xml);
        assert_eq!(cfg.public_base_url, "https://arena.example.org/api");

        env.insert("ARENA_DEFAULT_FORMAT".to_string(), "yaml".to_string());
        assert!(GatewayConfig::from_kv(&env).is_err());
    }

    #[test]
    fn env_file_lines_strip_quotes() {
        assert_eq!(strip_quotes("\"abc\""), "abc");
        assert_eq!(strip_quotes("'abc'"), "abc");
        assert_eq!(strip_quotes("abc"), "abc");
    }
}
