use serde::{Deserialize, Serialize};

use crate::core::service::{
    ConfigOption, ConfigResult, DEFAULT_INDEX, PathPredicate, path_prefix, path_regex,
    with_cache_policy, with_gzip_compression, with_index, with_not_found_file,
    with_request_logging, with_spa,
};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Directory served as the store root
    pub root: String,
    pub index: String,
    /// Store path answered with status 404; unset keeps the plain text 404
    pub not_found_file: Option<String>,
    /// Serve the index document for unknown paths (single page apps)
    pub client_side_routing: bool,
    pub gzip: bool,
    pub cache_policy: CachePolicyConfig,
    pub request_log: bool,
    pub log_format: LogFormat,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            root: ".".to_string(),
            index: DEFAULT_INDEX.to_string(),
            not_found_file: Some("404.html".to_string()),
            client_side_routing: false,
            gzip: true,
            cache_policy: CachePolicyConfig::default(),
            request_log: false,
            log_format: LogFormat::default(),
        }
    }
}

impl ServerConfig {
    /// `host:port`, bracketing IPv6 hosts
    pub fn listen_addr(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    /// The service options this configuration asks for.
    ///
    /// Request logging comes first so it sees the final status; gzip comes
    /// last so it sits right around the file resolver.
    pub fn service_options(&self) -> ConfigResult<Vec<ConfigOption>> {
        let mut options = Vec::new();

        if self.request_log {
            options.push(with_request_logging());
        }
        if self.cache_policy.enabled {
            options.push(with_cache_policy(self.cache_policy.predicates()?));
        }
        options.push(with_index(self.index.clone()));
        if let Some(not_found_file) = &self.not_found_file {
            options.push(with_not_found_file(not_found_file.clone()));
        }
        if self.client_side_routing {
            options.push(with_spa());
        }
        if self.gzip {
            options.push(with_gzip_compression());
        }

        Ok(options)
    }
}

/// Paths answered with long-lived caching headers
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct CachePolicyConfig {
    pub enabled: bool,
    pub prefixes: Vec<String>,
    /// Regular expressions matched against the decoded request path
    pub patterns: Vec<String>,
}

impl Default for CachePolicyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            prefixes: vec!["/_assets/".to_string(), "/_next/".to_string()],
            patterns: Vec::new(),
        }
    }
}

impl CachePolicyConfig {
    pub fn predicates(&self) -> ConfigResult<Vec<PathPredicate>> {
        let mut predicates: Vec<PathPredicate> =
            self.prefixes.iter().map(|p| path_prefix(p.clone())).collect();
        for pattern in &self.patterns {
            predicates.push(path_regex(pattern)?);
        }
        Ok(predicates)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}
