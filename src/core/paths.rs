use crate::error::{Error, Result};
use std::env;
use std::path::PathBuf;

/// Base buildstep config directory (~/.config/buildstep/, %APPDATA%\buildstep on Windows)
pub fn buildstep() -> Result<PathBuf> {
    #[cfg(windows)]
    {
        let appdata = env::var("APPDATA").map_err(|_| {
            Error::internal_unexpected(
                "APPDATA environment variable not set on Windows".to_string(),
            )
        })?;
        Ok(PathBuf::from(appdata).join("buildstep"))
    }

    #[cfg(not(windows))]
    {
        let home = env::var("HOME").map_err(|_| {
            Error::internal_unexpected(
                "HOME environment variable not set on Unix-like system".to_string(),
            )
        })?;
        Ok(PathBuf::from(home).join(".config").join("buildstep"))
    }
}

/// Global buildstep.json config file path
pub fn buildstep_json() -> Result<PathBuf> {
    Ok(buildstep()?.join("buildstep.json"))
}
