//! Standard locations for mashup files

use std::path::PathBuf;

/// Configuration directory
///
/// Returns: `~/.config/mashup` (platform config dir)
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mashup")
}

/// Default config file path
///
/// Returns: `~/.config/mashup/config.yaml`
pub fn default_config_path() -> PathBuf {
    default_config_dir().join("config.yaml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_path() {
        let path = default_config_path();
        assert!(path.ends_with("mashup/config.yaml"));
        assert!(path.starts_with(default_config_dir()));
    }
}
