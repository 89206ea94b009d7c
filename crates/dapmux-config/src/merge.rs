use crate::config::Config;
use crate::error::ConfigError;

/// Layer the TOML document `overlay_toml` over `base`.
///
/// Tables merge key by key at every depth, so an overlay that sets
/// `[adapters.java.capabilities] hit_conditions` keeps the java port.
/// `origin` names the overlay in parse errors.
pub fn merge_configs(base: &Config, overlay_toml: &str, origin: &str) -> Result<Config, ConfigError> {
    let mut merged = toml::Value::try_from(base).map_err(|e| ConfigError::Parse {
        origin: "<defaults>".into(),
        message: e.to_string(),
    })?;
    let overlay: toml::Value = toml::from_str(overlay_toml).map_err(ConfigError::parse(origin))?;
    merge_values(&mut merged, &overlay);
    merged.try_into().map_err(ConfigError::parse(origin))
}

/// Arrays and scalars in `overlay` replace; tables recurse.
fn merge_values(base: &mut toml::Value, overlay: &toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base_table), toml::Value::Table(overlay_table)) => {
            for (key, val) in overlay_table {
                if let Some(base_val) = base_table.get_mut(key) {
                    merge_values(base_val, val);
                } else {
                    base_table.insert(key.clone(), val.clone());
                }
            }
        }
        (base, overlay) => {
            *base = overlay.clone();
        }
    }
}
