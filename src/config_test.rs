use super::*;
use std::sync::Mutex;

// Env vars are process-global; serialize every test that touches them.
static ENV_LOCK: Mutex<()> = Mutex::new(());

const VARS: &[&str] = &[
    "NEXTAUTH_SECRET",
    "NEXT_PUBLIC_API_URL",
    "PORT",
    "PUBLIC_DIR",
    "UPLOADS_DIR",
    "COOKIE_SECURE",
    "SESSION_MAX_AGE_SECS",
    "REFRESH_SETTLE_MS",
    "BACKEND_REQUEST_TIMEOUT_SECS",
    "BACKEND_CONNECT_TIMEOUT_SECS",
];

/// # Safety
/// Caller must hold `ENV_LOCK`.
unsafe fn clear_env() {
    for var in VARS {
        unsafe { std::env::remove_var(var) };
    }
}

#[test]
fn from_env_requires_secret() {
    let _guard = ENV_LOCK.lock().unwrap();
    unsafe { clear_env() };

    let err = AppConfig::from_env().unwrap_err();
    assert!(matches!(err, ConfigError::Missing { var: "NEXTAUTH_SECRET" }));
}

#[test]
fn from_env_rejects_blank_secret() {
    let _guard = ENV_LOCK.lock().unwrap();
    unsafe {
        clear_env();
        std::env::set_var("NEXTAUTH_SECRET", "   ");
    }

    assert!(AppConfig::from_env().is_err());
    unsafe { clear_env() };
}

#[test]
fn from_env_defaults() {
    let _guard = ENV_LOCK.lock().unwrap();
    unsafe {
        clear_env();
        std::env::set_var("NEXTAUTH_SECRET", "s3cret");
    }

    let cfg = AppConfig::from_env().unwrap();
    assert_eq!(cfg.api_url, DEFAULT_API_URL);
    assert_eq!(cfg.session_secret, "s3cret");
    assert_eq!(cfg.port, DEFAULT_PORT);
    assert_eq!(cfg.public_dir, PathBuf::from("public"));
    assert_eq!(cfg.uploads_dir, PathBuf::from("public/uploads"));
    assert!(!cfg.cookie_secure);
    assert_eq!(cfg.session_max_age_secs, DEFAULT_SESSION_MAX_AGE_SECS);
    assert_eq!(cfg.refresh_settle, Duration::from_millis(100));
    assert_eq!(
        cfg.backend_timeouts,
        BackendTimeouts {
            request_secs: DEFAULT_BACKEND_REQUEST_TIMEOUT_SECS,
            connect_secs: DEFAULT_BACKEND_CONNECT_TIMEOUT_SECS
        }
    );

    unsafe { clear_env() };
}

#[test]
fn from_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    unsafe {
        clear_env();
        std::env::set_var("NEXTAUTH_SECRET", "s3cret");
        std::env::set_var("NEXT_PUBLIC_API_URL", "https://api.example.test/");
        std::env::set_var("PORT", "8080");
        std::env::set_var("UPLOADS_DIR", "/var/lib/kebaya/uploads");
        std::env::set_var("COOKIE_SECURE", "yes");
        std::env::set_var("REFRESH_SETTLE_MS", "0");
        std::env::set_var("BACKEND_REQUEST_TIMEOUT_SECS", "5");
    }

    let cfg = AppConfig::from_env().unwrap();
    assert_eq!(cfg.api_url, "https://api.example.test");
    assert_eq!(cfg.port, 8080);
    assert_eq!(cfg.uploads_dir, PathBuf::from("/var/lib/kebaya/uploads"));
    assert!(cfg.cookie_secure);
    assert_eq!(cfg.refresh_settle, Duration::ZERO);
    assert_eq!(cfg.backend_timeouts.request_secs, 5);

    unsafe { clear_env() };
}

#[test]
fn from_env_rejects_bad_port() {
    let _guard = ENV_LOCK.lock().unwrap();
    unsafe {
        clear_env();
        std::env::set_var("NEXTAUTH_SECRET", "s3cret");
        std::env::set_var("PORT", "not-a-port");
    }

    let err = AppConfig::from_env().unwrap_err();
    assert!(matches!(err, ConfigError::Invalid { var: "PORT", .. }));

    unsafe { clear_env() };
}

#[test]
fn from_env_rejects_bad_cookie_secure() {
    let _guard = ENV_LOCK.lock().unwrap();
    unsafe {
        clear_env();
        std::env::set_var("NEXTAUTH_SECRET", "s3cret");
        std::env::set_var("COOKIE_SECURE", "maybe");
    }

    assert!(matches!(AppConfig::from_env(), Err(ConfigError::Invalid { var: "COOKIE_SECURE", .. })));

    unsafe { clear_env() };
}

#[test]
fn parse_bool_variants() {
    for val in ["1", "true", "YES", " on "] {
        assert_eq!(parse_bool(val), Some(true), "expected true for {val:?}");
    }
    for val in ["0", "false", "No", "off"] {
        assert_eq!(parse_bool(val), Some(false), "expected false for {val:?}");
    }
    assert_eq!(parse_bool(""), None);
    assert_eq!(parse_bool("maybe"), None);
}
