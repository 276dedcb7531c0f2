use std::path::Path;
use std::path::PathBuf;

use yaml_rust::Yaml;
use yaml_rust::YamlLoader;

use super::FleetError;


/// Reads a yaml file and returns its first document.
pub fn yaml_from_path(path: &Path) -> Result<Yaml, FleetError> {
    let file_contents = std::fs::read_to_string(path)?;
    let mut yaml_cfgs = YamlLoader::load_from_str(&file_contents)?;
    if yaml_cfgs.is_empty() {
        return Err(FleetError::InvalidConfig(format!("{} is empty", path.display())));
    }
    return Ok(yaml_cfgs.swap_remove(0));
}

/// yaml-rust distinguishes `5` from `5.0`; config values accept either.
pub fn yaml_f64(yaml_cfg: &Yaml, key: &str, default: f64) -> Result<f64, FleetError> {
    let value = &yaml_cfg[key];
    if value.is_badvalue() || value.is_null() {
        return Ok(default);
    }
    match value.as_f64().or(value.as_i64().map(|vv| vv as f64)) {
        Some(vv) => Ok(vv),
        None => Err(FleetError::InvalidConfig(format!("{} must be a number", key))),
    }
}

pub fn yaml_u32(yaml_cfg: &Yaml, key: &str, default: u32) -> Result<u32, FleetError> {
    let value = &yaml_cfg[key];
    if value.is_badvalue() || value.is_null() {
        return Ok(default);
    }
    match value.as_i64() {
        Some(vv) if vv >= 0 => Ok(vv as u32),
        _ => Err(FleetError::InvalidConfig(format!("{} must be a non-negative integer", key))),
    }
}

pub fn yaml_opt_str<'a>(yaml_cfg: &'a Yaml, key: &str) -> Option<&'a str> {
    yaml_cfg[key].as_str()
}

pub fn str_to_absolute_path(path_str: &str, default_base_dir: &Path) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        return path;
    } else {
        return [default_base_dir, Path::new(&path)].iter().collect();
    }
}
