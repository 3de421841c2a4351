use anyhow::{Context, Result};
use std::path::PathBuf;
use std::str::FromStr;

pub const CACHE_CAPACITY_VAR: &str = "RTILES_CACHE_CAPACITY";
pub const REQUEST_WORKERS_VAR: &str = "RTILES_REQUEST_WORKERS";
pub const TILE_ROOT_VAR: &str = "RTILES_TILE_ROOT";
pub const LOG_VAR: &str = "RTILES_LOG";

/// 查看器运行配置
#[derive(Debug, Clone, PartialEq)]
pub struct ViewerConfig {
    /// 瓦片缓存容量（瓦片数）
    pub cache_capacity: usize,
    /// 解码线程数
    pub request_workers: usize,
    /// 瓦片根目录
    pub tile_root: PathBuf,
    /// env_logger 过滤规则
    pub log_filter: String,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            cache_capacity: 256,
            request_workers: 2,
            tile_root: default_tile_root(),
            log_filter: "info".to_string(),
        }
    }
}

impl ViewerConfig {
    /// 先读取 .env（不存在也没关系），再读环境变量
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Ok(Self {
            cache_capacity: parse_var(&lookup, CACHE_CAPACITY_VAR)?
                .unwrap_or(defaults.cache_capacity),
            request_workers: parse_var(&lookup, REQUEST_WORKERS_VAR)?
                .unwrap_or(defaults.request_workers),
            tile_root: lookup(TILE_ROOT_VAR)
                .map(PathBuf::from)
                .unwrap_or(defaults.tile_root),
            log_filter: lookup(LOG_VAR).unwrap_or(defaults.log_filter),
        })
    }
}

fn parse_var<F, T>(lookup: &F, key: &str) -> Result<Option<T>>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    lookup(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .with_context(|| format!("invalid value for {}: {:?}", key, raw))
        })
        .transpose()
}

fn default_tile_root() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join("rtiles").join("tiles"))
        .unwrap_or_else(|| PathBuf::from("tiles"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let config = ViewerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, ViewerConfig::default());
        assert_eq!(config.cache_capacity, 256);
        assert_eq!(config.request_workers, 2);
    }

    #[test]
    fn reads_overrides() {
        let config = ViewerConfig::from_lookup(lookup(&[
            (CACHE_CAPACITY_VAR, " 64 "),
            (REQUEST_WORKERS_VAR, "4"),
            (TILE_ROOT_VAR, "/srv/tiles"),
            (LOG_VAR, "rtiles=debug"),
        ]))
        .unwrap();
        assert_eq!(config.cache_capacity, 64);
        assert_eq!(config.request_workers, 4);
        assert_eq!(config.tile_root, PathBuf::from("/srv/tiles"));
        assert_eq!(config.log_filter, "rtiles=debug");
    }

    #[test]
    fn malformed_number_names_the_variable() {
        let err = ViewerConfig::from_lookup(lookup(&[(REQUEST_WORKERS_VAR, "many")])).unwrap_err();
        assert!(err.to_string().contains(REQUEST_WORKERS_VAR));
    }
}
