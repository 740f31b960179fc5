//! Server runtime configuration.

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Simulation and broadcast ticks per second.
    pub tick_rate: u32,
    pub max_clients: usize,
    /// Idle time after which a connection is kicked.
    pub client_timeout: Duration,
}

impl ServerConfig {
    /// `host:port` for the listener.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Period of one simulation tick. A zero rate is treated as 1 Hz.
    pub fn tick_duration(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.tick_rate.max(1)))
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            tick_rate: 60,
            max_clients: 16,
            client_timeout: Duration::from_secs(5),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_addr(), "127.0.0.1:8080");
        assert_eq!(config.max_clients, 16);
        assert_eq!(config.client_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_tick_duration() {
        let config = ServerConfig {
            tick_rate: 50,
            ..Default::default()
        };
        assert_eq!(config.tick_duration(), Duration::from_millis(20));

        let zero = ServerConfig {
            tick_rate: 0,
            ..Default::default()
        };
        assert_eq!(zero.tick_duration(), Duration::from_secs(1));
    }
}
