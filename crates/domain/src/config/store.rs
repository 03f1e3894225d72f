use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub database_url: Option<String>,
    #[serde(default = "d_pool_size")]
    pub pool_size: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            pool_size: d_pool_size(),
        }
    }
}

fn d_pool_size() -> u32 {
    10
}
