//! YAML persistence of [`SgmOptions`].

use crate::{Error, Result, SgmOptions};
use std::fs;
use std::path::Path;

pub fn parse_options(yaml: &str) -> Result<SgmOptions> {
    let opts: SgmOptions =
        serde_yaml::from_str(yaml).map_err(|e| Error::Config(e.to_string()))?;
    opts.validate()?;
    Ok(opts)
}

pub fn load_options(path: impl AsRef<Path>) -> Result<SgmOptions> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path)
        .map_err(|e| Error::Io(format!("reading {}: {e}", path.display())))?;
    parse_options(&raw)
}

pub fn options_to_yaml(opts: &SgmOptions) -> Result<String> {
    serde_yaml::to_string(opts).map_err(|e| Error::Config(e.to_string()))
}

pub fn write_options(path: impl AsRef<Path>, opts: &SgmOptions) -> Result<()> {
    let path = path.as_ref();
    let s = options_to_yaml(opts)?;
    fs::write(path, s).map_err(|e| Error::Io(format!("writing {}: {e}", path.display())))
}
