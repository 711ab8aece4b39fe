//! File-backed wordlist input providers

use crate::input::{InputError, InputMap, InputProvider};
use std::path::Path;

/// A single wordlist bound to one substitution keyword
///
/// Entries are read eagerly, one per line; blank lines and `#` comment lines
/// are skipped.
pub struct WordlistInput {
    keyword: String,
    entries: Vec<Vec<u8>>,
    cursor: Option<usize>,
}

impl WordlistInput {
    /// Loads a wordlist from a file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the wordlist file
    /// * `keyword` - The placeholder token this wordlist substitutes
    pub fn from_file(path: &Path, keyword: &str) -> Result<Self, InputError> {
        let content = std::fs::read_to_string(path).map_err(|source| InputError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let entries: Vec<Vec<u8>> = content
            .lines()
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(|line| line.as_bytes().to_vec())
            .collect();
        if entries.is_empty() {
            return Err(InputError::Empty(path.display().to_string()));
        }
        Ok(Self::from_entries(keyword, entries))
    }

    /// Builds a wordlist from in-memory entries
    pub fn from_entries(keyword: &str, entries: Vec<Vec<u8>>) -> Self {
        Self {
            keyword: keyword.to_string(),
            entries,
            cursor: None,
        }
    }

    /// The keyword this wordlist substitutes
    pub fn keyword(&self) -> &str {
        &self.keyword
    }

    fn entry(&self, index: usize) -> &[u8] {
        &self.entries[index]
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

impl InputProvider for WordlistInput {
    fn reset(&mut self) {
        self.cursor = None;
    }

    fn next(&mut self) -> bool {
        let next = self.cursor.map_or(0, |c| c + 1);
        if next >= self.entries.len() {
            return false;
        }
        self.cursor = Some(next);
        true
    }

    fn value(&self) -> InputMap {
        let mut map = InputMap::new();
        if let Some(cursor) = self.cursor {
            map.insert(self.keyword.clone(), self.entries[cursor].clone());
        }
        map
    }

    fn position(&self) -> usize {
        self.cursor.unwrap_or(0)
    }

    fn total(&self) -> usize {
        self.entries.len()
    }
}

/// Cartesian product over several wordlists, one keyword each
///
/// Every combination of entries is yielded exactly once, with the last
/// wordlist cycling fastest. A single wordlist degenerates to a plain scan.
pub struct ProductInput {
    lists: Vec<WordlistInput>,
    position: Option<usize>,
    total: usize,
}

impl ProductInput {
    /// Combines wordlists into a product provider
    ///
    /// # Arguments
    ///
    /// * `lists` - The wordlists to combine; must not be empty
    pub fn new(lists: Vec<WordlistInput>) -> Self {
        let total = lists.iter().map(|l| l.len()).product();
        Self {
            lists,
            position: None,
            total,
        }
    }
}

impl InputProvider for ProductInput {
    fn reset(&mut self) {
        self.position = None;
    }

    fn next(&mut self) -> bool {
        let next = self.position.map_or(0, |p| p + 1);
        if next >= self.total {
            return false;
        }
        self.position = Some(next);
        true
    }

    fn value(&self) -> InputMap {
        let mut map = InputMap::new();
        let Some(position) = self.position else {
            return map;
        };
        // Decompose the flat position into per-list indices, last list
        // cycling fastest.
        let mut remainder = position;
        for list in self.lists.iter().rev() {
            let index = remainder % list.len();
            remainder /= list.len();
            map.insert(list.keyword().to_string(), list.entry(index).to_vec());
        }
        map
    }

    fn position(&self) -> usize {
        self.position.unwrap_or(0)
    }

    fn total(&self) -> usize {
        self.total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn entries(words: &[&str]) -> Vec<Vec<u8>> {
        words.iter().map(|w| w.as_bytes().to_vec()).collect()
    }

    #[test]
    fn test_wordlist_iteration() {
        let mut input = WordlistInput::from_entries("FUZZ", entries(&["a", "b", "c"]));

        let mut seen = Vec::new();
        while input.next() {
            seen.push((input.position(), input.value()["FUZZ"].clone()));
        }

        assert_eq!(seen.len(), 3);
        assert_eq!(seen[0], (0, b"a".to_vec()));
        assert_eq!(seen[2], (2, b"c".to_vec()));
        assert_eq!(input.total(), 3);
    }

    #[test]
    fn test_wordlist_reset() {
        let mut input = WordlistInput::from_entries("FUZZ", entries(&["a", "b"]));
        while input.next() {}
        assert!(!input.next());

        input.reset();
        assert!(input.next());
        assert_eq!(input.position(), 0);
        assert_eq!(input.value()["FUZZ"], b"a".to_vec());
    }

    #[test]
    fn test_wordlist_from_file_skips_comments() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "admin").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "# a comment").unwrap();
        writeln!(file, "backup").unwrap();
        file.flush().unwrap();

        let input = WordlistInput::from_file(file.path(), "FUZZ").unwrap();
        assert_eq!(input.total(), 2);
    }

    #[test]
    fn test_wordlist_from_empty_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "# only a comment").unwrap();
        file.flush().unwrap();

        let result = WordlistInput::from_file(file.path(), "FUZZ");
        assert!(matches!(result, Err(InputError::Empty(_))));
    }

    #[test]
    fn test_wordlist_missing_file() {
        let result = WordlistInput::from_file(Path::new("/nonexistent/words.txt"), "FUZZ");
        assert!(matches!(result, Err(InputError::Io { .. })));
    }

    #[test]
    fn test_product_covers_all_combinations() {
        let users = WordlistInput::from_entries("USER", entries(&["root", "admin"]));
        let passwords = WordlistInput::from_entries("PASS", entries(&["x", "y", "z"]));
        let mut input = ProductInput::new(vec![users, passwords]);

        assert_eq!(input.total(), 6);

        let mut combinations = Vec::new();
        while input.next() {
            let value = input.value();
            combinations.push((
                String::from_utf8(value["USER"].clone()).unwrap(),
                String::from_utf8(value["PASS"].clone()).unwrap(),
            ));
        }

        assert_eq!(combinations.len(), 6);
        // Last wordlist cycles fastest
        assert_eq!(combinations[0], ("root".to_string(), "x".to_string()));
        assert_eq!(combinations[1], ("root".to_string(), "y".to_string()));
        assert_eq!(combinations[3], ("admin".to_string(), "x".to_string()));
    }

    #[test]
    fn test_product_single_list() {
        let words = WordlistInput::from_entries("FUZZ", entries(&["a", "b"]));
        let mut input = ProductInput::new(vec![words]);

        assert_eq!(input.total(), 2);
        assert!(input.next());
        assert_eq!(input.value()["FUZZ"], b"a".to_vec());
        assert!(input.next());
        assert!(!input.next());
    }
}
