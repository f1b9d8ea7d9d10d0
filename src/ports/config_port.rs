//! Configuration access port.
//!
//! Values are looked up by INI section and key; typed getters fall back to
//! the supplied default when the key is absent or unparseable.

use crate::domain::error::IndexError;

pub trait ConfigPort {
    fn get_string(&self, section: &str, key: &str) -> Option<String>;
    fn get_int(&self, section: &str, key: &str, default: i64) -> i64;
    fn get_double(&self, section: &str, key: &str, default: f64) -> f64;
    fn get_bool(&self, section: &str, key: &str, default: bool) -> bool;

    /// Like `get_string`, but absence is an error naming the key.
    fn require(&self, section: &str, key: &str) -> Result<String, IndexError> {
        self.get_string(section, key)
            .ok_or_else(|| IndexError::ConfigMissing {
                section: section.to_string(),
                key: key.to_string(),
            })
    }
}
