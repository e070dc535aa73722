//! Configuration validation rules.

use super::schema::Config;

/// Validate configuration and return aggregated validation errors.
pub fn validate_config(config: &Config) -> crate::Result<()> {
    let mut errors = Vec::new();

    if config.relay.channel.trim().is_empty() {
        errors.push("relay.channel must not be empty".to_string());
    }
    if config.relay.event_buffer == 0 {
        errors.push("relay.event_buffer must be > 0".to_string());
    }

    if config.channels.telegram.enabled && config.channels.telegram.token.trim().is_empty() {
        errors.push("channels.telegram.token is required when telegram is enabled".to_string());
    }

    if config.server.port == 0 {
        errors.push("server.port must be > 0".to_string());
    }

    if config.keepalive.enabled {
        if config.keepalive.interval_secs == 0 {
            errors.push("keepalive.interval_secs must be > 0".to_string());
        }
        let url = config.keepalive_url();
        if !url.starts_with("http://") && !url.starts_with("https://") {
            errors.push(format!("keepalive.url must be an http(s) URL, got {}", url));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(crate::Error::Validation(errors.join("; ")))
    }
}
