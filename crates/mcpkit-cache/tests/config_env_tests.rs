//! Environment overrides for cache configuration.
//!
//! Kept in its own test binary so the process environment is not shared with
//! other tests.

use mcpkit_cache::{CacheManagerConfig, CacheError};

#[test]
fn test_environment_overrides_file_values() {
    let temp_dir = tempfile::TempDir::new().unwrap();
    let path = temp_dir.path().join("cache.toml");
    std::fs::write(&path, "namespace = \"from-file\"\ndefault_ttl_secs = 30\n").unwrap();

    std::env::set_var("MCPKIT_CACHE__DEFAULT_TTL_SECS", "900");
    let config = CacheManagerConfig::load(Some(&path));
    std::env::remove_var("MCPKIT_CACHE__DEFAULT_TTL_SECS");

    let config = config.unwrap();
    assert_eq!(config.namespace, "from-file");
    assert_eq!(config.default_ttl_secs, 900);

    std::env::set_var("MCPKIT_CACHE__NAMESPACE", "bad/namespace");
    let result = CacheManagerConfig::load(Some(&path));
    std::env::remove_var("MCPKIT_CACHE__NAMESPACE");

    assert!(matches!(result, Err(CacheError::Config(_))));
}
