use crate::{DEFAULT_LISTEN, DEFAULT_PORT};

use lazy_static::lazy_static;
use serde::Deserialize;
use slog::Drain;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    server: Server,
    store: Store,
}

#[derive(Debug, Deserialize, Clone)]
struct Server {
    listen: Option<String>,
    port: Option<u16>,
    log_level: Option<String>,
    max_connection: Option<usize>,
    prom_listen: Option<String>,
    prom_port: Option<u16>,
}

#[derive(Debug, Deserialize, Clone)]
struct Store {
    sweep_interval_ms: Option<u64>,
}

// Config
pub static mut SERVER_CONFIG: Option<Config> = None;

pub fn set_global_config(config: Config) {
    unsafe {
        SERVER_CONFIG.replace(config);
    }
}

pub fn config_listen_or_default() -> String {
    unsafe {
        if let Some(c) = &SERVER_CONFIG {
            if let Some(s) = c.server.listen.clone() {
                return s;
            }
        }
    }

    DEFAULT_LISTEN.to_owned()
}

pub fn config_port_or_default() -> String {
    unsafe {
        if let Some(c) = &SERVER_CONFIG {
            if let Some(s) = c.server.port {
                return s.to_string();
            }
        }
    }

    DEFAULT_PORT.to_owned()
}

pub fn config_prom_listen_or_default() -> String {
    unsafe {
        if let Some(c) = &SERVER_CONFIG {
            if let Some(s) = c.server.prom_listen.clone() {
                return s;
            }
        }
    }

    DEFAULT_LISTEN.to_owned()
}

pub fn config_prom_port_or_default() -> Option<u16> {
    unsafe {
        if let Some(c) = &SERVER_CONFIG {
            if let Some(p) = c.server.prom_port {
                return Some(p);
            }
        }
    }

    None
}

fn log_level_str() -> String {
    unsafe {
        if let Some(c) = &SERVER_CONFIG {
            if let Some(l) = c.server.log_level.clone() {
                return l;
            }
        }
    }
    "info".to_owned()
}

pub fn log_level() -> usize {
    let level_str = log_level_str();
    match level_str.as_str() {
        "off" => 0,
        "critical" => 1,
        "error" => 2,
        "warning" => 3,
        "info" => 4,
        "debug" => 5,
        "trace" => 6,
        _ => 4,
    }
}

pub fn config_max_connection() -> usize {
    unsafe {
        if let Some(c) = &SERVER_CONFIG {
            if let Some(n) = c.server.max_connection {
                return n;
            }
        }
    }

    10000
}

pub fn config_local_pool_number() -> usize {
    // default use 8 localset pool to handle connections
    8
}

pub fn sweep_interval_or_default() -> u64 {
    unsafe {
        if let Some(c) = &SERVER_CONFIG {
            if let Some(ms) = c.store.sweep_interval_ms {
                return ms;
            }
        }
    }

    // default sweep cadence in ms
    100
}

pub fn sweep_batch_size_or_default() -> usize {
    // expired keys reclaimed per lock acquisition
    20
}

lazy_static! {
    pub static ref LOGGER: slog::Logger = slog::Logger::root(
        slog_term::FullFormat::new(slog_term::PlainSyncDecorator::new(std::io::stdout()))
            .use_file_location()
            .build()
            .filter_level(slog::Level::from_usize(log_level()).unwrap_or(slog::Level::Info))
            .fuse(),
        slog::o!()
    );
}
