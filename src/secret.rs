use std::fmt;

/// Elevation credential. The backing bytes are overwritten before release,
/// both on [`Secret::wipe`] and on drop, and the formatting impls never
/// reveal the value, so the type can ride inside `Action` messages and debug
/// logs without leaking.
#[derive(Default, Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: String) -> Self {
        Self(value)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Access the raw value. Callers must `wipe` as soon as the value has
    /// been written out.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Overwrite the backing bytes with zeros, then truncate.
    pub fn wipe(&mut self) {
        // NUL bytes keep the String valid UTF-8.
        unsafe {
            for b in self.0.as_bytes_mut() {
                *b = 0;
            }
        }
        self.0.clear();
    }
}

impl Drop for Secret {
    fn drop(&mut self) {
        self.wipe();
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(****)")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("****")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn wipe_empties_the_value() {
        let mut secret = Secret::new(String::from("hunter2"));
        assert!(!secret.is_empty());
        secret.wipe();
        assert!(secret.is_empty());
        assert_eq!(secret.expose(), "");
    }

    #[test]
    fn formatting_redacts() {
        let secret = Secret::new(String::from("hunter2"));
        assert_eq!(format!("{:?}", secret), "Secret(****)");
        assert_eq!(format!("{}", secret), "****");
    }
}
