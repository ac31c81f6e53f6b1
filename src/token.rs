//! API token loading.
//!
//! Источники по приоритету:
//! 1. --token: либо сам токен, либо путь к файлу с токеном (поддерживается `~/`);
//! 2. ENV DO_TOKEN.
//!
//! Файл с токеном, читаемый группой/остальными, даёт warning (unix).
//! Токен не из 32/64 hex-символов даёт warning, но не ошибку.

use std::fmt;
use std::path::{Path, PathBuf};

use log::warn;
use zeroize::Zeroizing;

use crate::error::{Error, Result};

pub const TOKEN_ENV: &str = "DO_TOKEN";

/// Secret bearer token; wiped from memory on drop and never printed.
#[derive(Clone)]
pub struct ApiToken(Zeroizing<String>);

impl ApiToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(Zeroizing::new(token.into()))
    }

    pub fn expose(&self) -> &str {
        self.0.as_str()
    }

    /// 32 or 64 hex characters, like DigitalOcean personal access tokens.
    pub fn looks_valid(&self) -> bool {
        let t = self.expose();
        matches!(t.len(), 32 | 64) && t.chars().all(|c| c.is_ascii_hexdigit())
    }
}

impl fmt::Debug for ApiToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiToken(***)")
    }
}

/// Resolve the token from `--token` (literal or file) or `DO_TOKEN`.
pub fn load_token(arg: Option<&str>) -> Result<ApiToken> {
    let env = std::env::var(TOKEN_ENV).ok();
    resolve_token(arg, env.as_deref())
}

pub fn resolve_token(arg: Option<&str>, env: Option<&str>) -> Result<ApiToken> {
    let token = match arg.map(str::trim).filter(|s| !s.is_empty()) {
        Some(a) => {
            let path = expand_home(a);
            if path.is_file() {
                read_token_file(&path)?
            } else {
                ApiToken::new(a)
            }
        }
        None => ApiToken::new(env.map(str::trim).unwrap_or_default()),
    };
    if token.expose().is_empty() {
        return Err(Error::config(format!(
            "must pass API token via --token or {} environment variable",
            TOKEN_ENV
        )));
    }
    if !token.looks_valid() {
        warn!("token looks invalid (unexpected size or non-hex characters)");
    }
    Ok(token)
}

fn read_token_file(path: &Path) -> Result<ApiToken> {
    let raw = Zeroizing::new(std::fs::read_to_string(path).map_err(|e| {
        Error::config(format!("read token file {}: {}", path.display(), e))
    })?);
    warn_if_shared(path);
    Ok(ApiToken::new(raw.trim()))
}

#[cfg(unix)]
fn warn_if_shared(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    if let Ok(meta) = std::fs::metadata(path) {
        if meta.permissions().mode() & 0o044 != 0 {
            warn!("token file {} is readable by group or other", path.display());
        }
    }
}

#[cfg(not(unix))]
fn warn_if_shared(_path: &Path) {}

fn expand_home(p: &str) -> PathBuf {
    if let Some(rest) = p.strip_prefix("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home).join(rest);
        }
    }
    PathBuf::from(p)
}
