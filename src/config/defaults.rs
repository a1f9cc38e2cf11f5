//! Default value functions referenced by the serde derives.

use super::logging::LogFormat;

pub fn default_port() -> u16 {
    3537
}

pub fn default_cors_origins() -> String {
    "*".to_string()
}

// Server section

pub fn default_max_message_size() -> usize {
    16 * 1024
}

pub fn default_chat_max_length() -> usize {
    256
}

pub fn default_abandonment_grace_secs() -> u64 {
    60
}

pub fn default_matchmaking_wait_bound_secs() -> u64 {
    120
}

pub fn default_ping_timeout_secs() -> u64 {
    60
}

pub fn default_sweep_interval_secs() -> u64 {
    5
}

pub fn default_message_queue_capacity() -> usize {
    64
}

// Publisher section

pub fn default_publish_max_attempts() -> u32 {
    5
}

pub fn default_publish_initial_delay_ms() -> u64 {
    50
}

pub fn default_publish_max_delay_ms() -> u64 {
    2000
}

pub fn default_publish_backoff_multiplier() -> f64 {
    2.0
}

pub fn default_publish_jitter_factor() -> f64 {
    0.1
}

// Logging section

pub fn default_log_dir() -> String {
    "logs".to_string()
}

pub fn default_log_filename() -> String {
    "server.log".to_string()
}

pub fn default_rotation() -> String {
    "daily".to_string()
}

pub fn default_enable_file_logging() -> bool {
    false
}

pub fn default_log_format() -> LogFormat {
    LogFormat::Json
}
