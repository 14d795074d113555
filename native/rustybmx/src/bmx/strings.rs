//! BMX String Tables
//!
//! Every string in a document is stored once and referenced by a dense index.
//! Index 0 is reserved for "no string" and is never assigned.
//!
//! - Writer side: strings are collected, then frozen into sorted order so that
//!   identical trees always produce identical bytes.
//! - Reader side: indices are assigned in the order STRING records arrive.

use std::collections::BTreeSet;

use super::error::FormatError;
use super::format::width_for;

/// Reserved index for an absent string
pub const NULL_INDEX: u32 = 0;

/// Writer-side table while strings are being collected
#[derive(Debug, Default)]
pub struct StringTableBuilder {
    strings: BTreeSet<String>,
}

impl StringTableBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a string. Absent strings and duplicates are ignored.
    pub fn add_string(&mut self, s: Option<&str>) {
        if let Some(s) = s {
            if !self.strings.contains(s) {
                self.strings.insert(s.to_owned());
            }
        }
    }

    /// Number of distinct strings registered so far
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }

    /// Freeze the table, assigning indices 1..=N in sorted order
    pub fn finish(self) -> WriterStringTable {
        let entries: Vec<String> = self.strings.into_iter().collect();
        let longest = entries.iter().map(String::len).max().unwrap_or(0);
        WriterStringTable { entries, longest }
    }
}

/// Frozen writer-side table
#[derive(Debug)]
pub struct WriterStringTable {
    /// Sorted entries; entry `i` has index `i + 1`
    entries: Vec<String>,
    /// Longest entry in UTF-8 bytes
    longest: usize,
}

impl WriterStringTable {
    /// Index assigned to a string, NULL_INDEX for an absent one
    ///
    /// # Panics
    ///
    /// Panics if `s` was never registered with the builder. That is a bug in
    /// the caller's collection pass, not a property of the data.
    pub fn index_of(&self, s: Option<&str>) -> u32 {
        let Some(s) = s else {
            return NULL_INDEX;
        };
        match self.entries.binary_search_by(|e| e.as_str().cmp(s)) {
            Ok(pos) => pos as u32 + 1,
            Err(_) => panic!("string {:?} was not registered before finish()", s),
        }
    }

    /// Entries in index order (index 1 first)
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }

    /// Number of strings (the null slot is not counted)
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Length of the longest entry in bytes
    pub fn longest(&self) -> usize {
        self.longest
    }

    /// Bytes needed for a reference: wide enough for the highest index, N
    pub fn reference_width(&self) -> u8 {
        width_for(self.entries.len())
    }

    /// Bytes needed for a STRING record's length prefix
    pub fn length_width(&self) -> u8 {
        width_for(self.longest)
    }
}

/// Reader-side table, filled as STRING records are read
#[derive(Debug)]
pub struct ReaderStringTable {
    entries: Vec<String>,
    /// Number of STRING records the header announced
    declared: u32,
}

impl ReaderStringTable {
    pub fn new(declared: u32) -> Self {
        ReaderStringTable {
            // Header values are untrusted, don't preallocate them blindly
            entries: Vec::with_capacity((declared as usize).min(4096)),
            declared,
        }
    }

    /// Append a string, returning its index
    pub fn add(&mut self, s: String) -> Result<u32, FormatError> {
        if self.entries.len() >= self.declared as usize {
            return Err(FormatError::Malformed(format!(
                "more than the {} declared string records",
                self.declared
            )));
        }
        self.entries.push(s);
        Ok(self.entries.len() as u32)
    }

    /// Resolve an index. NULL_INDEX resolves to None.
    pub fn get(&self, index: u32) -> Result<Option<&str>, FormatError> {
        if index == NULL_INDEX {
            return Ok(None);
        }
        self.entries
            .get(index as usize - 1)
            .map(|s| Some(s.as_str()))
            .ok_or(FormatError::UnresolvedString {
                index,
                defined: self.entries.len(),
            })
    }

    /// Resolve an index into an owned string
    pub fn get_owned(&self, index: u32) -> Result<Option<String>, FormatError> {
        self.get(index).map(|s| s.map(str::to_owned))
    }

    /// Number of strings read so far
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(strings: &[&str]) -> WriterStringTable {
        let mut builder = StringTableBuilder::new();
        for &s in strings {
            builder.add_string(Some(s));
        }
        builder.finish()
    }

    #[test]
    fn test_dedup_and_sorted_indices() {
        let table = build(&["world", "hello", "world", "abc"]);
        assert_eq!(table.len(), 3);
        assert_eq!(table.iter().collect::<Vec<_>>(), ["abc", "hello", "world"]);
        assert_eq!(table.index_of(Some("abc")), 1);
        assert_eq!(table.index_of(Some("hello")), 2);
        assert_eq!(table.index_of(Some("world")), 3);
    }

    #[test]
    fn test_absent_string_is_null_index() {
        let mut builder = StringTableBuilder::new();
        builder.add_string(None);
        assert!(builder.is_empty());
        let table = builder.finish();
        assert_eq!(table.index_of(None), NULL_INDEX);
    }

    #[test]
    fn test_empty_string_is_a_real_entry() {
        let table = build(&[""]);
        assert_eq!(table.len(), 1);
        assert_eq!(table.index_of(Some("")), 1);
    }

    #[test]
    #[should_panic(expected = "was not registered")]
    fn test_unregistered_lookup_panics() {
        let table = build(&["a"]);
        table.index_of(Some("b"));
    }

    #[test]
    fn test_reference_width_boundary() {
        // 255 strings + the null slot = 256 entries: indices fit one byte
        let strings: Vec<String> = (0..255).map(|i| format!("s{i}")).collect();
        let refs: Vec<&str> = strings.iter().map(String::as_str).collect();
        assert_eq!(build(&refs).reference_width(), 1);

        // 256 strings + the null slot = 257 entries: index 256 needs two bytes
        let strings: Vec<String> = (0..256).map(|i| format!("s{i}")).collect();
        let refs: Vec<&str> = strings.iter().map(String::as_str).collect();
        assert_eq!(build(&refs).reference_width(), 2);
    }

    #[test]
    fn test_length_width_boundary() {
        let s255 = "x".repeat(255);
        let s256 = "x".repeat(256);
        assert_eq!(build(&[s255.as_str()]).length_width(), 1);
        assert_eq!(build(&[s256.as_str()]).length_width(), 2);
        // Width follows encoded bytes, not chars
        let wide = "é".repeat(128);
        assert_eq!(build(&[wide.as_str()]).longest(), 256);
        assert_eq!(build(&[wide.as_str()]).length_width(), 2);
    }

    #[test]
    fn test_reader_sequential_indices() {
        let mut table = ReaderStringTable::new(2);
        assert_eq!(table.add("first".to_string()), Ok(1));
        assert_eq!(table.add("second".to_string()), Ok(2));
        assert_eq!(table.get(0), Ok(None));
        assert_eq!(table.get(1), Ok(Some("first")));
        assert_eq!(table.get_owned(2), Ok(Some("second".to_string())));
    }

    #[test]
    fn test_reader_unassigned_index() {
        let mut table = ReaderStringTable::new(3);
        for s in ["a", "b", "c"] {
            table.add(s.to_string()).unwrap();
        }
        assert_eq!(
            table.get(7),
            Err(FormatError::UnresolvedString { index: 7, defined: 3 })
        );
    }

    #[test]
    fn test_reader_rejects_undeclared_records() {
        let mut table = ReaderStringTable::new(1);
        table.add("a".to_string()).unwrap();
        assert!(matches!(
            table.add("b".to_string()),
            Err(FormatError::Malformed(_))
        ));
    }
}
