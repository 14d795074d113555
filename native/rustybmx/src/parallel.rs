//! Parallel batch encode/decode
//!
//! Uses Rayon to process independent documents concurrently. Each document is
//! still encoded or decoded by a single thread.

use rayon::prelude::*;

use crate::bmx::{decode, encode_with_settings, BmxError, Settings};
use crate::dom::Tree;

/// Encode many trees in parallel, results in input order
pub fn encode_batch(trees: &[Tree], settings: Settings) -> Vec<Result<Vec<u8>, BmxError>> {
    trees
        .par_iter()
        .map(|tree| encode_with_settings(tree, settings))
        .collect()
}

/// Encode many trees with settings given as a packed header word
///
/// Unsupported settings fail every document with the same error.
pub fn encode_batch_with_storage_value(trees: &[Tree], value: u32) -> Vec<Result<Vec<u8>, BmxError>> {
    match Settings::from_wire(value) {
        Ok(settings) => encode_batch(trees, settings),
        Err(e) => trees.iter().map(|_| Err(e.clone().into())).collect(),
    }
}

/// Decode many streams in parallel, results in input order
pub fn decode_batch(inputs: &[&[u8]]) -> Vec<Result<Option<Tree>, BmxError>> {
    inputs.par_iter().map(|bytes| decode(bytes)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bmx::{encode, FormatError, Setting};
    use crate::dom::{Element, NodeData, ROOT};

    fn doc(name: &str) -> Tree {
        let mut tree = Tree::new(NodeData::Document);
        let root = tree.append_child(ROOT, Element::new(name).into()).unwrap();
        tree.append_child(root, NodeData::text(name.to_uppercase())).unwrap();
        tree
    }

    #[test]
    fn test_encode_batch_matches_sequential() {
        let trees: Vec<Tree> = ["a", "b", "c", "d"].iter().map(|n| doc(n)).collect();
        let results = encode_batch(&trees, Settings::default());
        assert_eq!(results.len(), 4);
        for (tree, result) in trees.iter().zip(results) {
            assert_eq!(result.unwrap(), encode(tree).unwrap());
        }
    }

    #[test]
    fn test_encode_batch_propagates_settings_error() {
        let mut settings = Settings::default();
        settings.set(Setting::Compression);
        let results = encode_batch(&[doc("a")], settings);
        assert!(matches!(
            results[0],
            Err(BmxError::Format(FormatError::UnsupportedSettings(1)))
        ));
    }

    #[test]
    fn test_packed_settings_validated_for_batch() {
        let trees = [doc("a"), doc("b")];
        let results = encode_batch_with_storage_value(&trees, 0);
        assert!(results.iter().all(Result::is_ok));

        let results = encode_batch_with_storage_value(&trees, 2);
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| matches!(
            r,
            Err(BmxError::Format(FormatError::UnsupportedSettings(2)))
        )));
    }

    #[test]
    fn test_decode_batch_isolates_failures() {
        let good = encode(&doc("x")).unwrap();
        let bad = b"nope".to_vec();
        let results = decode_batch(&[good.as_slice(), bad.as_slice(), good.as_slice()]);
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].as_ref().unwrap().as_ref().unwrap(), &doc("x"));
        assert!(matches!(
            results[1],
            Err(BmxError::Format(FormatError::BadMagic(_)))
        ));
        assert!(results[2].is_ok());
    }
}
