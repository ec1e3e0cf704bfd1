pub mod cfg_cache;

pub use cfg_cache::CfgCache;
