use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CaseSensitivity {
    #[default]
    Sensitive,
    Insensitive,
}

/// Compares two strings either naturally (digit runs as numbers, so
/// "img2" < "img10") or by plain code point order.
pub fn natural_compare(a: &str, b: &str, case: CaseSensitivity, natural: bool) -> Ordering {
    match (natural, case) {
        (true, CaseSensitivity::Sensitive) => natord::compare(a, b),
        (true, CaseSensitivity::Insensitive) => natord::compare_ignore_case(a, b),
        (false, CaseSensitivity::Sensitive) => a.cmp(b),
        (false, CaseSensitivity::Insensitive) => a
            .chars()
            .flat_map(char::to_lowercase)
            .cmp(b.chars().flat_map(char::to_lowercase)),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NaturalComparator {
    pub case: CaseSensitivity,
    pub natural: bool,
}

impl Default for NaturalComparator {
    fn default() -> Self {
        Self { case: CaseSensitivity::Sensitive, natural: true }
    }
}

impl NaturalComparator {
    pub fn new(case: CaseSensitivity, natural: bool) -> Self {
        Self { case, natural }
    }

    pub fn compare(&self, a: &str, b: &str) -> Ordering {
        natural_compare(a, b, self.case, self.natural)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_natural_numbers() {
        let cmp = NaturalComparator::default();
        assert_eq!(cmp.compare("img2.jpg", "img10.jpg"), Ordering::Less);
        assert_eq!(cmp.compare("img10.jpg", "img2.jpg"), Ordering::Greater);
        assert_eq!(cmp.compare("img2.jpg", "img2.jpg"), Ordering::Equal);
    }

    #[test]
    fn test_lexicographic_numbers() {
        let cmp = NaturalComparator::new(CaseSensitivity::Sensitive, false);
        assert_eq!(cmp.compare("img2.jpg", "img10.jpg"), Ordering::Greater);
    }

    #[test]
    fn test_case_folding() {
        let sensitive = NaturalComparator::new(CaseSensitivity::Sensitive, false);
        let insensitive = NaturalComparator::new(CaseSensitivity::Insensitive, false);
        assert_eq!(sensitive.compare("B.jpg", "a.jpg"), Ordering::Less);
        assert_eq!(insensitive.compare("B.jpg", "a.jpg"), Ordering::Greater);
        assert_eq!(insensitive.compare("ABC", "abc"), Ordering::Equal);

        let natural_insensitive = NaturalComparator::new(CaseSensitivity::Insensitive, true);
        assert_eq!(natural_insensitive.compare("IMG2", "img10"), Ordering::Less);
    }
}
