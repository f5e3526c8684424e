//! Runtime configuration: defaults, then `GENIE_*` environment variables,
//! then command-line flags.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use tracing::warn;

use crate::gate::default_public_prefixes;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateConfig {
    pub http_port: u16,
    pub bind: String,
    pub store_timeout: Duration,
    pub session_ttl: Duration,
    pub secure_cookies: bool,
    pub public_prefixes: Vec<String>,
    pub route_table_file: Option<PathBuf>,
    pub seed_file: Option<PathBuf>,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            http_port: 8080,
            bind: "0.0.0.0".to_string(),
            store_timeout: Duration::from_millis(4000),
            session_ttl: Duration::from_secs(3600),
            secure_cookies: false,
            public_prefixes: default_public_prefixes(),
            route_table_file: None,
            seed_file: None,
        }
    }
}

fn parse_bool(v: &str) -> Option<bool> {
    match v.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_list(v: &str) -> Vec<String> {
    v.split(',').map(|s| s.trim()).filter(|s| !s.is_empty()).map(|s| s.to_string()).collect()
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    let mut i = 0;
    while i < args.len() {
        if args[i] == flag && i + 1 < args.len() {
            return Some(args[i + 1].as_str());
        }
        i += 1;
    }
    None
}

impl GateConfig {
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        cfg.apply(|name| env::var(name).ok());
        cfg
    }

    /// Apply variables from `lookup` on top of the current values. Values that
    /// do not parse are logged and skipped.
    pub fn apply<F: Fn(&str) -> Option<String>>(&mut self, lookup: F) {
        if let Some(v) = lookup("GENIE_HTTP_PORT") {
            match v.parse::<u16>() {
                Ok(p) => self.http_port = p,
                Err(_) => warn!("ignoring GENIE_HTTP_PORT={:?}", v),
            }
        }
        if let Some(v) = lookup("GENIE_BIND") {
            if !v.trim().is_empty() { self.bind = v.trim().to_string(); }
        }
        if let Some(v) = lookup("GENIE_STORE_TIMEOUT_MS") {
            match v.parse::<u64>() {
                Ok(ms) if ms > 0 => self.store_timeout = Duration::from_millis(ms),
                _ => warn!("ignoring GENIE_STORE_TIMEOUT_MS={:?}", v),
            }
        }
        if let Some(v) = lookup("GENIE_SESSION_TTL_SECS") {
            match v.parse::<u64>() {
                Ok(s) if s > 0 => self.session_ttl = Duration::from_secs(s),
                _ => warn!("ignoring GENIE_SESSION_TTL_SECS={:?}", v),
            }
        }
        if let Some(v) = lookup("GENIE_SECURE_COOKIES") {
            match parse_bool(&v) {
                Some(b) => self.secure_cookies = b,
                None => warn!("ignoring GENIE_SECURE_COOKIES={:?}", v),
            }
        }
        if let Some(v) = lookup("GENIE_PUBLIC_PREFIXES") {
            let list = parse_list(&v);
            if list.is_empty() {
                warn!("ignoring empty GENIE_PUBLIC_PREFIXES");
            } else {
                self.public_prefixes = list;
            }
        }
        if let Some(v) = lookup("GENIE_ROUTE_TABLE") {
            if !v.trim().is_empty() { self.route_table_file = Some(PathBuf::from(v.trim())); }
        }
        if let Some(v) = lookup("GENIE_SEED_FILE") {
            if !v.trim().is_empty() { self.seed_file = Some(PathBuf::from(v.trim())); }
        }
    }

    /// `--port`, `--bind`, `--seed`, `--routes`.
    pub fn apply_args(&mut self, args: &[String]) {
        if let Some(v) = flag_value(args, "--port") {
            match v.parse::<u16>() {
                Ok(p) => self.http_port = p,
                Err(_) => warn!("ignoring --port {:?}", v),
            }
        }
        if let Some(v) = flag_value(args, "--bind") { self.bind = v.to_string(); }
        if let Some(v) = flag_value(args, "--seed") { self.seed_file = Some(PathBuf::from(v)); }
        if let Some(v) = flag_value(args, "--routes") { self.route_table_file = Some(PathBuf::from(v)); }
    }
}
