//! Configuration lookup port.

/// Section/key lookups over whatever holds the settings (an INI file in
/// practice). Values come back raw; typing and validation belong to the
/// caller, which knows the defaults and what counts as invalid.
pub trait ConfigPort {
    fn get_string(&self, section: &str, key: &str) -> Option<String>;
}
