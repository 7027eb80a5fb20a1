use super::models::Config;
use std::collections::HashSet;
use thiserror::Error;

/// Longest accepted refresh period, one year
pub const MAX_UPDATE_INTERVAL_HOURS: u64 = 24 * 366;

/// Filter ids are unix-second timestamps and must fit in an `i64`
pub const MAX_FILTER_ID: u64 = i64::MAX as u64;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("update_interval_hours must be positive")]
    ZeroUpdateInterval,

    #[error("update_interval_hours {hours} exceeds the maximum of {max}")]
    UpdateIntervalTooLarge { hours: u64, max: u64 },

    #[error("filter_dir must not be empty")]
    EmptyFilterDir,

    #[error("Invalid filter file extension '{extension}'")]
    InvalidExtension { extension: String },

    #[error("Filter '{name}' uses reserved id 0")]
    ReservedFilterId { name: String },

    #[error("Filter '{name}' id {id} exceeds the maximum of {max}")]
    FilterIdOutOfRange { name: String, id: u64, max: u64 },

    #[error("Duplicate filter id {id}")]
    DuplicateFilterId { id: u64 },

    #[error("Duplicate filter name '{name}'")]
    DuplicateFilterName { name: String },

    #[error("Duplicate filter url '{url}'")]
    DuplicateFilterUrl { url: String },

    #[error("Filter '{name}' has invalid url '{url}', expected http:// or https://")]
    InvalidFilterUrl { name: String, url: String },
}

/// Validate the entire configuration
pub fn validate(config: &Config) -> Result<(), ValidationError> {
    validate_sync(config)?;
    validate_filters(config)?;
    Ok(())
}

fn validate_sync(config: &Config) -> Result<(), ValidationError> {
    if config.sync.update_interval_hours == 0 {
        return Err(ValidationError::ZeroUpdateInterval);
    }
    if config.sync.update_interval_hours > MAX_UPDATE_INTERVAL_HOURS {
        return Err(ValidationError::UpdateIntervalTooLarge {
            hours: config.sync.update_interval_hours,
            max: MAX_UPDATE_INTERVAL_HOURS,
        });
    }

    if config.sync.filter_dir.as_os_str().is_empty() {
        return Err(ValidationError::EmptyFilterDir);
    }

    let extension = &config.sync.extension;
    if extension.is_empty() || extension.contains(['/', '\\', '.']) {
        return Err(ValidationError::InvalidExtension {
            extension: extension.clone(),
        });
    }

    Ok(())
}

/// Configured filters must satisfy the same uniqueness rules as `Registry::add`
fn validate_filters(config: &Config) -> Result<(), ValidationError> {
    let mut ids = HashSet::new();
    let mut names = HashSet::new();
    let mut urls = HashSet::new();

    for filter in &config.filters {
        if filter.id == 0 {
            return Err(ValidationError::ReservedFilterId {
                name: filter.name.clone(),
            });
        }
        if filter.id > MAX_FILTER_ID {
            return Err(ValidationError::FilterIdOutOfRange {
                name: filter.name.clone(),
                id: filter.id,
                max: MAX_FILTER_ID,
            });
        }
        if !ids.insert(filter.id) {
            return Err(ValidationError::DuplicateFilterId { id: filter.id });
        }
        if !names.insert(filter.name.as_str()) {
            return Err(ValidationError::DuplicateFilterName {
                name: filter.name.clone(),
            });
        }
        if !urls.insert(filter.url.as_str()) {
            return Err(ValidationError::DuplicateFilterUrl {
                url: filter.url.clone(),
            });
        }

        let scheme_ok = reqwest::Url::parse(&filter.url)
            .map(|url| matches!(url.scheme(), "http" | "https"))
            .unwrap_or(false);
        if !scheme_ok {
            return Err(ValidationError::InvalidFilterUrl {
                name: filter.name.clone(),
                url: filter.url.clone(),
            });
        }
    }

    Ok(())
}
