//! Numerals in the script of the book.

use crate::config::Config;

/// Renders numbers with a locale's digit set. Styles without a digit set
/// get Western digits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NumberLocaliser {
    /// Added to an ASCII digit's code point.
    offset: Option<u32>,
}

impl NumberLocaliser {
    pub fn new(config: &Config, style: &str) -> Self {
        Self {
            offset: config.localised_digits.get(style).copied(),
        }
    }

    pub fn western() -> Self {
        Self::default()
    }

    pub fn localise(&self, n: u32) -> String {
        let digits = n.to_string();
        let Some(offset) = self.offset else {
            return digits;
        };
        digits
            .chars()
            .map(|c| char::from_u32(c as u32 + offset).unwrap_or(c))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_western_is_plain() {
        let config = Config::default();
        assert_eq!(NumberLocaliser::new(&config, "LTR").localise(1024), "1024");
        assert_eq!(NumberLocaliser::western().localise(7), "7");
    }

    #[test]
    fn test_script_digits() {
        let config = Config::default();
        assert_eq!(NumberLocaliser::new(&config, "fa").localise(12), "۱۲");
        assert_eq!(NumberLocaliser::new(&config, "ar").localise(305), "٣٠٥");
        assert_eq!(NumberLocaliser::new(&config, "hi").localise(9), "९");
        assert_eq!(NumberLocaliser::new(&config, "my").localise(10), "၁၀");
    }
}
