//! BMX Writer
//!
//! Encodes a tree in two passes: the first collects every string into the
//! table, the second emits the header, the table and the node records.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use byteorder::{BigEndian, WriteBytesExt};
use tracing::{debug, trace};

use super::error::{BmxError, FormatError};
use super::format::{write_uint, Header, Tag};
use super::settings::Settings;
use super::strings::{StringTableBuilder, WriterStringTable};
use crate::dom::{NodeData, NodeId, TreeAccess};

/// Writer for the BMX format
///
/// Output is buffered and flushed at the end of every `write_tree`. The
/// underlying stream is never closed here: pass `&mut W` to keep using it,
/// or take it back with `into_inner`.
pub struct BmxWriter<W: Write> {
    writer: BufWriter<W>,
    settings: Settings,
}

impl<W: Write> BmxWriter<W> {
    /// Create a writer with default settings
    pub fn new(writer: W) -> Self {
        Self::with_settings(writer, Settings::default())
    }

    pub fn with_settings(writer: W, settings: Settings) -> Self {
        BmxWriter {
            writer: BufWriter::new(writer),
            settings,
        }
    }

    /// Write a complete document
    pub fn write_tree<T: TreeAccess>(&mut self, tree: &T) -> Result<(), BmxError> {
        self.settings.ensure_supported()?;

        let table = collect_strings(tree);
        let header = Header {
            settings: self.settings,
            string_count: u32::try_from(table.len())
                .map_err(|_| FormatError::TooLarge("string table"))?,
            reference_width: table.reference_width(),
            length_width: table.length_width(),
        };
        if u32::try_from(table.longest()).is_err() {
            return Err(FormatError::TooLarge("string length").into());
        }

        debug!(
            strings = header.string_count,
            reference_width = header.reference_width,
            length_width = header.length_width,
            "writing BMX document"
        );

        header.write(&mut self.writer)?;
        self.write_string_table(&table, header.length_width)?;
        let nodes = self.write_content(tree, &table, header.reference_width)?;
        self.writer.write_u8(Tag::Eof.byte())?;
        self.writer.flush()?;

        debug!(nodes, "wrote BMX document");
        Ok(())
    }

    /// Flush and return the underlying stream
    pub fn into_inner(self) -> Result<W, BmxError> {
        self.writer
            .into_inner()
            .map_err(|e| BmxError::from(e.into_error()))
    }

    /// One STRING record per entry, in index order
    fn write_string_table(&mut self, table: &WriterStringTable, length_width: u8) -> io::Result<()> {
        for s in table.iter() {
            self.writer.write_u8(Tag::String.byte())?;
            write_uint(&mut self.writer, s.len() as u32, length_width)?;
            self.writer.write_all(s.as_bytes())?;
        }
        Ok(())
    }

    /// Emit node records in document order, returning the number of nodes
    fn write_content<T: TreeAccess>(
        &mut self,
        tree: &T,
        table: &WriterStringTable,
        reference_width: u8,
    ) -> Result<usize, BmxError> {
        enum Visit {
            Enter(NodeId),
            Leave,
        }

        let Some(root) = tree.root_id() else {
            return Ok(0);
        };

        let mut nodes = 0;
        let mut stack = vec![Visit::Enter(root)];
        while let Some(visit) = stack.pop() {
            match visit {
                Visit::Leave => self.writer.write_u8(Tag::ChildrenEnd.byte())?,
                Visit::Enter(id) => {
                    let Some(data) = tree.node_data(id) else {
                        continue;
                    };
                    self.write_node(data, table, reference_width)?;
                    nodes += 1;

                    let children = tree.children_vec(id);
                    if !children.is_empty() {
                        self.writer.write_u8(Tag::ChildrenStart.byte())?;
                        // Leave is popped after every child has been written
                        stack.push(Visit::Leave);
                        stack.extend(children.into_iter().rev().map(Visit::Enter));
                    }
                }
            }
        }
        Ok(nodes)
    }

    /// Tag byte plus the kind's fixed payload
    fn write_node(
        &mut self,
        data: &NodeData,
        table: &WriterStringTable,
        width: u8,
    ) -> Result<(), BmxError> {
        let tag = Tag::from(data.kind());
        trace!(?tag, "node record");

        let w = &mut self.writer;
        w.write_u8(tag.byte())?;

        match data {
            NodeData::Document | NodeData::Container => {}
            NodeData::Element(element) => {
                write_ref(w, table, element.namespace_uri.as_deref(), width)?;
                write_ref(w, table, Some(element.tag_name.as_str()), width)?;
                let count = u32::try_from(element.attributes.len())
                    .map_err(|_| FormatError::TooLarge("attribute count"))?;
                w.write_u32::<BigEndian>(count)?;
                for attr in &element.attributes {
                    write_ref(w, table, Some(attr.name.as_str()), width)?;
                    write_ref(w, table, attr.value.as_deref(), width)?;
                }
            }
            NodeData::Text {
                content,
                ignorable_whitespace,
            } => {
                write_ref(w, table, content.as_deref(), width)?;
                w.write_u8(u8::from(*ignorable_whitespace))?;
            }
            NodeData::CData(content) | NodeData::Comment(content) | NodeData::EntityReference(content) => {
                write_ref(w, table, content.as_deref(), width)?;
            }
            NodeData::DocumentType {
                qualified_name,
                public_id,
                system_id,
            } => {
                write_ref(w, table, qualified_name.as_deref(), width)?;
                write_ref(w, table, public_id.as_deref(), width)?;
                write_ref(w, table, system_id.as_deref(), width)?;
            }
            NodeData::ProcessingInstruction { target, data } => {
                write_ref(w, table, target.as_deref(), width)?;
                write_ref(w, table, data.as_deref(), width)?;
            }
        }
        Ok(())
    }
}

/// Fixed-width table reference for a string field
#[inline]
fn write_ref<W: Write>(w: &mut W, table: &WriterStringTable, s: Option<&str>, width: u8) -> io::Result<()> {
    write_uint(w, table.index_of(s), width)
}

/// First pass: register every string field of every node
fn collect_strings<T: TreeAccess>(tree: &T) -> WriterStringTable {
    let mut builder = StringTableBuilder::new();
    let mut stack: Vec<NodeId> = tree.root_id().into_iter().collect();

    while let Some(id) = stack.pop() {
        if let Some(data) = tree.node_data(id) {
            for_each_string(data, |s| builder.add_string(s));
        }
        stack.extend(tree.children_vec(id));
    }
    builder.finish()
}

/// Visit every string-valued field of a node
fn for_each_string(data: &NodeData, mut f: impl FnMut(Option<&str>)) {
    match data {
        NodeData::Document | NodeData::Container => {}
        NodeData::Element(element) => {
            f(element.namespace_uri.as_deref());
            f(Some(element.tag_name.as_str()));
            for attr in &element.attributes {
                f(Some(attr.name.as_str()));
                f(attr.value.as_deref());
            }
        }
        NodeData::Text { content, .. }
        | NodeData::CData(content)
        | NodeData::Comment(content)
        | NodeData::EntityReference(content) => f(content.as_deref()),
        NodeData::DocumentType {
            qualified_name,
            public_id,
            system_id,
        } => {
            f(qualified_name.as_deref());
            f(public_id.as_deref());
            f(system_id.as_deref());
        }
        NodeData::ProcessingInstruction { target, data } => {
            f(target.as_deref());
            f(data.as_deref());
        }
    }
}

/// Encode a tree into a byte vector with default settings
pub fn encode<T: TreeAccess>(tree: &T) -> Result<Vec<u8>, BmxError> {
    encode_with_settings(tree, Settings::default())
}

/// Encode a tree into a byte vector
pub fn encode_with_settings<T: TreeAccess>(tree: &T, settings: Settings) -> Result<Vec<u8>, BmxError> {
    let mut out = Vec::new();
    BmxWriter::with_settings(&mut out, settings).write_tree(tree)?;
    Ok(out)
}

/// Encode a tree with settings given as a packed header word
///
/// Unknown bits are rejected, the same as when a header is read.
pub fn encode_with_storage_value<T: TreeAccess>(tree: &T, value: u32) -> Result<Vec<u8>, BmxError> {
    encode_with_settings(tree, Settings::from_wire(value)?)
}

/// Encode a tree into a file, creating or truncating it
///
/// The file is opened and closed here, also when writing fails.
pub fn write_file<T: TreeAccess, P: AsRef<Path>>(tree: &T, path: P) -> Result<(), BmxError> {
    let file = File::create(path).map_err(BmxError::Io)?;
    let mut writer = BmxWriter::new(file);
    writer.write_tree(tree)?;
    writer.into_inner()?.sync_all()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bmx::format::HEADER_LEN;
    use crate::bmx::settings::Setting;
    use crate::dom::{Element, Tree, ROOT};

    fn small_tree() -> Tree {
        let mut tree = Tree::new(NodeData::Document);
        let root = tree
            .append_child(ROOT, Element::new("root").attr("id", "1").into())
            .unwrap();
        tree.append_child(root, NodeData::text("hi")).unwrap();
        tree
    }

    #[test]
    fn test_exact_layout() {
        let bytes = encode(&small_tree()).unwrap();

        #[rustfmt::skip]
        let expected: Vec<u8> = [
            &b"BMX1"[..],
            &[0, 0, 0, 0],             // settings
            &[0, 0, 0, 4, 1, 1],       // 4 strings, 1-byte refs, 1-byte lengths
            &[0x0A, 1], b"1",          // index 1
            &[0x0A, 2], b"hi",         // index 2
            &[0x0A, 2], b"id",         // index 3
            &[0x0A, 4], b"root",       // index 4
            &[0x04, 0x7B],             // document {
            &[0x06, 0, 4, 0, 0, 0, 1, 3, 1], // <root id="1">
            &[0x7B, 0x09, 2, 0, 0x7D], // { "hi" }
            &[0x7D, 0xFF],             // } EOF
        ]
        .concat();
        assert_eq!(bytes, expected);
    }

    #[test]
    fn test_repeated_strings_written_once() {
        let mut tree = Tree::new(Element::new("ul").into());
        for _ in 0..50 {
            tree.append_child(ROOT, Element::new("li").attr("class", "x").into())
                .unwrap();
        }
        let bytes = encode(&tree).unwrap();
        assert_eq!(&bytes[8..12], &[0, 0, 0, 4]);

        // STRING records run from the header up to the first node tag
        let mut strings = Vec::new();
        let mut pos = HEADER_LEN;
        while bytes[pos] == Tag::String.byte() {
            let len = bytes[pos + 1] as usize;
            strings.push(std::str::from_utf8(&bytes[pos + 2..pos + 2 + len]).unwrap());
            pos += 2 + len;
        }
        assert_eq!(strings, ["class", "li", "ul", "x"]);
        assert_eq!(bytes[pos], Tag::Element.byte());
    }

    #[test]
    fn test_absent_strings_use_null_index() {
        let tree = Tree::new(NodeData::DocumentType {
            qualified_name: Some("html".to_string()),
            public_id: None,
            system_id: None,
        });
        let bytes = encode(&tree).unwrap();
        let mut expected = b"BMX1".to_vec();
        expected.extend_from_slice(&[0, 0, 0, 0, 0, 0, 0, 1, 1, 1]);
        expected.extend_from_slice(&[0x0A, 4]);
        expected.extend_from_slice(b"html");
        expected.extend_from_slice(&[0x05, 1, 0, 0, 0xFF]);
        assert_eq!(bytes, expected);
    }

    #[test]
    fn test_wide_references() {
        let mut tree = Tree::new(NodeData::Container);
        for i in 0..300 {
            tree.append_child(ROOT, NodeData::comment(format!("c{i:03}")))
                .unwrap();
        }
        let bytes = encode(&tree).unwrap();
        assert_eq!(&bytes[8..HEADER_LEN], &[0, 0, 0x01, 0x2C, 2, 1]);
    }

    #[test]
    fn test_deterministic_output() {
        assert_eq!(encode(&small_tree()).unwrap(), encode(&small_tree()).unwrap());
    }

    #[test]
    fn test_packed_settings_validated() {
        assert_eq!(
            encode_with_storage_value(&small_tree(), 0).unwrap(),
            encode(&small_tree()).unwrap()
        );
        let err = encode_with_storage_value(&small_tree(), 2).unwrap_err();
        assert!(matches!(err, BmxError::Format(FormatError::UnsupportedSettings(2))));
        let err = encode_with_storage_value(&small_tree(), 1).unwrap_err();
        assert!(matches!(err, BmxError::Format(FormatError::UnsupportedSettings(1))));
    }

    #[test]
    fn test_compression_is_rejected_before_writing() {
        let mut settings = Settings::default();
        settings.set(Setting::Compression);

        let mut out = Vec::new();
        let err = BmxWriter::with_settings(&mut out, settings)
            .write_tree(&small_tree())
            .unwrap_err();
        assert!(matches!(err, BmxError::Format(FormatError::UnsupportedSettings(1))));
        assert!(out.is_empty());
    }

    #[test]
    fn test_stream_stays_usable() {
        let mut writer = BmxWriter::new(Vec::new());
        writer.write_tree(&small_tree()).unwrap();
        let mut out = writer.into_inner().unwrap();
        out.push(0xAA);

        let mut expected = encode(&small_tree()).unwrap();
        expected.push(0xAA);
        assert_eq!(out, expected);
    }

    struct FailingWriter;

    impl Write for FailingWriter {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }
    }

    #[test]
    fn test_io_failure_propagates() {
        let err = BmxWriter::new(FailingWriter)
            .write_tree(&small_tree())
            .unwrap_err();
        assert!(matches!(err, BmxError::Io(ref e) if e.kind() == io::ErrorKind::BrokenPipe));
    }

    #[test]
    fn test_deep_tree_does_not_recurse() {
        let mut tree = Tree::new(NodeData::Container);
        let mut parent = ROOT;
        for _ in 0..100_000 {
            parent = tree.append_child(parent, NodeData::Container).unwrap();
        }
        let bytes = encode(&tree).unwrap();
        // header, 100_001 containers, 100_000 start/end pairs, EOF
        assert_eq!(bytes.len(), HEADER_LEN + 100_001 + 200_000 + 1);
    }
}
