//! INI file configuration adapter.

use std::path::Path;

use configparser::ini::Ini;
use tracing::debug;

use crate::domain::error::QuantsigError;
use crate::ports::config_port::ConfigPort;

pub struct FileConfigAdapter {
    config: Ini,
}

impl FileConfigAdapter {
    /// Read and parse an INI file. A missing file is `Io`, bad syntax is
    /// `ConfigParse` naming the file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, QuantsigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let adapter = Self::parse(&content).map_err(|reason| QuantsigError::ConfigParse {
            file: path.display().to_string(),
            reason,
        })?;
        debug!(path = %path.display(), "loaded config");
        Ok(adapter)
    }

    pub fn from_string(content: &str) -> Result<Self, QuantsigError> {
        Self::parse(content).map_err(|reason| QuantsigError::ConfigParse {
            file: "<string>".to_string(),
            reason,
        })
    }

    fn parse(content: &str) -> Result<Self, String> {
        let mut config = Ini::new();
        config.read(content.to_string())?;
        Ok(Self { config })
    }
}

fn invalid(section: &str, key: &str, reason: impl Into<String>) -> QuantsigError {
    QuantsigError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.into(),
    }
}

impl ConfigPort for FileConfigAdapter {
    fn get_string(&self, section: &str, key: &str) -> Option<String> {
        self.config.get(section, key).filter(|v| !v.trim().is_empty())
    }

    fn get_int(&self, section: &str, key: &str, default: i64) -> Result<i64, QuantsigError> {
        if self.get_string(section, key).is_none() {
            return Ok(default);
        }
        self.config
            .getint(section, key)
            .map(|v| v.unwrap_or(default))
            .map_err(|reason| invalid(section, key, reason))
    }

    fn get_double(&self, section: &str, key: &str, default: f64) -> Result<f64, QuantsigError> {
        if self.get_string(section, key).is_none() {
            return Ok(default);
        }
        match self.config.getfloat(section, key) {
            Ok(Some(v)) if v.is_finite() => Ok(v),
            Ok(Some(v)) => Err(invalid(
                section,
                key,
                format!("expected a finite number, got {v}"),
            )),
            Ok(None) => Ok(default),
            Err(reason) => Err(invalid(section, key, reason)),
        }
    }
}
