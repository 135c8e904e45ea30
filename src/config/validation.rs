//! Configuration value validation utilities.
//!
//! Validates the five parameter groups against the sanity constraints
//! implied by spec.md §3/§4.4 (thresholds must order consistently, regexes
//! must compile), matching the original `ConfigSubshop.runner`'s "make sure
//! the ad removal regex's compile" check.

use crate::config::Config;
use crate::error::SubSyncError;

/// Validate a fully-assembled [`Config`], returning the first problem found.
pub fn validate_config(config: &Config) -> crate::Result<()> {
    validate_sync_params(config)?;
    validate_rift_params(config)?;
    validate_phrase_params(config)?;
    validate_ad_params(config)?;
    Ok(())
}

fn validate_sync_params(config: &Config) -> crate::Result<()> {
    let p = &config.sync_params;
    if p.max_dev <= 0 || p.max_offset <= 0 {
        return Err(SubSyncError::config(
            "sync_params.max_dev and max_offset must be positive",
        ));
    }
    if p.max_rate <= 0.0 {
        return Err(SubSyncError::config("sync_params.max_rate must be positive"));
    }
    if p.min_ref_pts == 0 {
        return Err(SubSyncError::config(
            "sync_params.min_ref_pts must be at least 1",
        ));
    }
    Ok(())
}

fn validate_rift_params(config: &Config) -> crate::Result<()> {
    let p = &config.rift_params;
    if p.border_div < 2 {
        return Err(SubSyncError::config(
            "rift_params.border_div must be at least 2 (need both a floor and ceiling border)",
        ));
    }
    if p.min_pts == 0 {
        return Err(SubSyncError::config("rift_params.min_pts must be at least 1"));
    }
    if p.min_dev_frac <= 0.0 || p.max_dev_frac <= 0.0 {
        return Err(SubSyncError::config(
            "rift_params.min_dev_frac and max_dev_frac must be positive",
        ));
    }
    if p.trial_mins <= 0.0 {
        return Err(SubSyncError::config("rift_params.trial_mins must be positive"));
    }
    Ok(())
}

fn validate_phrase_params(config: &Config) -> crate::Result<()> {
    let p = &config.phrase_params;
    if p.min_str_len == 0 || p.min_word_len == 0 {
        return Err(SubSyncError::config(
            "phrase_params.min_str_len and min_word_len must be at least 1",
        ));
    }
    Ok(())
}

fn validate_ad_params(config: &Config) -> crate::Result<()> {
    for pattern in config
        .ad_params
        .limited_regexes
        .iter()
        .chain(config.ad_params.global_regexes.iter())
    {
        regex::Regex::new(pattern).map_err(|e| {
            SubSyncError::config(format!("cannot compile ad pattern '{}': {}", pattern, e))
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_validates() {
        assert!(validate_config(&Config::default()).is_ok());
    }

    #[test]
    fn test_rejects_zero_border_div() {
        let mut config = Config::default();
        config.rift_params.border_div = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_rejects_uncompilable_regex() {
        let mut config = Config::default();
        config.ad_params.global_regexes.push("[unterminated".to_string());
        let err = validate_config(&config).unwrap_err();
        assert!(matches!(err, SubSyncError::Config { .. }));
    }

    #[test]
    fn test_rejects_zero_min_ref_pts() {
        let mut config = Config::default();
        config.sync_params.min_ref_pts = 0;
        assert!(validate_config(&config).is_err());
    }
}
