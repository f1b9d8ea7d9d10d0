//! INI file configuration adapter.

use crate::domain::error::IndexError;
use crate::ports::config_port::ConfigPort;
use configparser::ini::Ini;
use std::path::Path;

#[derive(Debug)]
pub struct FileConfigAdapter {
    config: Ini,
}

impl FileConfigAdapter {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, IndexError> {
        let path = path.as_ref();
        let mut config = Ini::new();
        config.load(path).map_err(|reason| IndexError::ConfigParse {
            file: path.display().to_string(),
            reason,
        })?;
        Ok(Self { config })
    }

    pub fn from_string(content: &str) -> Result<Self, IndexError> {
        let mut config = Ini::new();
        config
            .read(content.to_string())
            .map_err(|reason| IndexError::ConfigParse {
                file: "<inline>".to_string(),
                reason,
            })?;
        Ok(Self { config })
    }

    fn parse_bool(value: &str) -> Option<bool> {
        match value.trim().to_lowercase().as_str() {
            "true" | "yes" | "1" => Some(true),
            "false" | "no" | "0" => Some(false),
            _ => None,
        }
    }
}

impl ConfigPort for FileConfigAdapter {
    fn get_string(&self, section: &str, key: &str) -> Option<String> {
        self.config
            .get(section, key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn get_int(&self, section: &str, key: &str, default: i64) -> i64 {
        self.config
            .getint(section, key)
            .ok()
            .flatten()
            .unwrap_or(default)
    }

    fn get_double(&self, section: &str, key: &str, default: f64) -> f64 {
        self.config
            .getfloat(section, key)
            .ok()
            .flatten()
            .unwrap_or(default)
    }

    fn get_bool(&self, section: &str, key: &str, default: bool) -> bool {
        self.config
            .get(section, key)
            .as_deref()
            .and_then(Self::parse_bool)
            .unwrap_or(default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", content).unwrap();
        file
    }

    const SAMPLE: &str = r#"
[sqlite]
path = /var/lib/eqindex/index.db
pool_size = 8

[index]
size = 50
emit_inception_entries = no

[cache]
enabled = true
ttl_seconds = 600

[log]
level = debug
"#;

    #[test]
    fn from_string_parses_sections() {
        let config = FileConfigAdapter::from_string(SAMPLE).unwrap();
        assert_eq!(
            config.get_string("sqlite", "path").as_deref(),
            Some("/var/lib/eqindex/index.db")
        );
        assert_eq!(config.get_int("sqlite", "pool_size", 4), 8);
        assert_eq!(config.get_int("index", "size", 100), 50);
        assert!(!config.get_bool("index", "emit_inception_entries", true));
        assert_eq!(config.get_int("cache", "ttl_seconds", 3600), 600);
        assert_eq!(config.get_string("log", "level").as_deref(), Some("debug"));
    }

    #[test]
    fn missing_keys_fall_back() {
        let config = FileConfigAdapter::from_string("[index]\nsize = many\n").unwrap();
        assert_eq!(config.get_string("index", "absent"), None);
        assert_eq!(config.get_int("index", "size", 100), 100);
        assert_eq!(config.get_int("nosuch", "size", 7), 7);
        assert_eq!(config.get_double("index", "size", 0.5), 0.5);
        assert!(config.get_bool("cache", "enabled", true));
    }

    #[test]
    fn empty_value_reads_as_absent() {
        let config = FileConfigAdapter::from_string("[sqlite]\npath =\n").unwrap();
        assert_eq!(config.get_string("sqlite", "path"), None);
        let err = config.require("sqlite", "path").unwrap_err();
        assert!(matches!(
            err,
            IndexError::ConfigMissing { section, key } if section == "sqlite" && key == "path"
        ));
    }

    #[test]
    fn bool_spellings() {
        let config = FileConfigAdapter::from_string(
            "[a]\nt1 = true\nt2 = YES\nt3 = 1\nf1 = false\nf2 = No\nf3 = 0\nbad = maybe\n",
        )
        .unwrap();
        for key in ["t1", "t2", "t3"] {
            assert!(config.get_bool("a", key, false), "{key}");
        }
        for key in ["f1", "f2", "f3"] {
            assert!(!config.get_bool("a", key, true), "{key}");
        }
        assert!(config.get_bool("a", "bad", true));
    }

    #[test]
    fn from_file_reads_config() {
        let file = create_temp_config(SAMPLE);
        let config = FileConfigAdapter::from_file(file.path()).unwrap();
        assert_eq!(config.require("index", "size").unwrap(), "50");
    }

    #[test]
    fn from_file_missing_is_parse_error() {
        let err = FileConfigAdapter::from_file("/nonexistent/eqindex.ini").unwrap_err();
        match err {
            IndexError::ConfigParse { file, .. } => assert!(file.contains("eqindex.ini")),
            other => panic!("expected ConfigParse, got: {other}"),
        }
    }
}
