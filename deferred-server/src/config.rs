use std::str::FromStr;
use std::time;

use envconfig::Envconfig;

#[derive(Envconfig, Clone)]
pub struct Config {
    #[envconfig(from = "BIND_HOST", default = "0.0.0.0")]
    pub host: String,

    #[envconfig(from = "BIND_PORT", default = "3310")]
    pub port: u16,

    /// Document served once it could be fetched.
    #[envconfig(default = "http://localhost:8000/")]
    pub upstream_url: String,

    #[envconfig(default = "10000")]
    pub retry_after: EnvMsDuration,

    #[envconfig(default = "15000")]
    pub timeout_after: EnvMsDuration,

    /// Bound on a single upstream fetch.
    #[envconfig(default = "5000")]
    pub request_timeout: EnvMsDuration,

    /// Stop trying and fail closed if the document could not be fetched by then.
    pub give_up_after: Option<EnvMsDuration>,

    #[envconfig(default = "true")]
    pub export_prometheus: bool,
}

impl Config {
    /// Produce a host:port address for binding a TcpListener.
    pub fn bind(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnvMsDuration(pub time::Duration);

#[derive(Debug, PartialEq, Eq)]
pub struct ParseEnvMsDurationError;

impl FromStr for EnvMsDuration {
    type Err = ParseEnvMsDurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let ms = s.parse::<u64>().map_err(|_| ParseEnvMsDurationError)?;

        Ok(EnvMsDuration(time::Duration::from_millis(ms)))
    }
}
