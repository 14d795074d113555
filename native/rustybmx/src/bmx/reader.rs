//! BMX Reader
//!
//! Single forward pass over the stream. Nodes are attached to the node on top
//! of an explicit parent stack, which CHILDREN_START pushes and CHILDREN_END pops.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use byteorder::{BigEndian, ReadBytesExt};
use tracing::{debug, trace};

use super::error::{BmxError, FormatError};
use super::format::{read_uint, Header, Tag};
use super::strings::ReaderStringTable;
use crate::dom::{Attribute, Element, NodeData, NodeId, NodeKind, Tree, TreeBuilder};

/// Reader for the BMX format
///
/// The source is wrapped in a `BufReader`, so bytes following the EOF tag
/// may be consumed from it. Calling `read_tree` again reads the next document
/// from the same stream, and `into_inner` hands back the rest.
pub struct BmxReader<R: Read> {
    reader: BufReader<R>,
}

fn malformed(msg: impl Into<String>) -> BmxError {
    FormatError::Malformed(msg.into()).into()
}

impl<R: Read> BmxReader<R> {
    pub fn new(reader: R) -> Self {
        BmxReader {
            reader: BufReader::new(reader),
        }
    }

    /// Return the buffered stream, positioned just after the last EOF tag read
    ///
    /// Bytes already buffered past that tag stay in the returned `BufReader`.
    pub fn into_inner(self) -> BufReader<R> {
        self.reader
    }

    /// Read one complete document
    ///
    /// Returns `None` when the body holds no node. Any error aborts the whole
    /// read; no partial tree is returned.
    pub fn read_tree<B: TreeBuilder>(&mut self) -> Result<Option<B>, BmxError> {
        let header = Header::read(&mut self.reader)?;
        debug!(
            strings = header.string_count,
            reference_width = header.reference_width,
            length_width = header.length_width,
            "reading BMX document"
        );

        let mut strings = ReaderStringTable::new(header.string_count);
        let mut tree: Option<B> = None;
        let mut parents: Vec<(NodeId, NodeKind)> = Vec::new();
        let mut last: Option<(NodeId, NodeKind)> = None;
        let mut nodes = 0usize;

        loop {
            let byte = self.reader.read_u8()?;
            let tag = Tag::from_byte(byte).ok_or(FormatError::UnknownTag(byte))?;
            trace!(?tag, "record");

            let data = match tag {
                Tag::Eof => break,
                Tag::String => {
                    let index = strings.len() as u32 + 1;
                    let s = self.read_string(header.length_width, index)?;
                    strings.add(s)?;
                    continue;
                }
                Tag::ChildrenStart => {
                    let (id, kind) =
                        last.ok_or_else(|| malformed("children block without a preceding node"))?;
                    if !kind.can_have_children() {
                        return Err(malformed(format!("{:?} node cannot have children", kind)));
                    }
                    parents.push((id, kind));
                    continue;
                }
                Tag::ChildrenEnd => {
                    let parent = parents
                        .pop()
                        .ok_or_else(|| malformed("children block closed without being opened"))?;
                    last = Some(parent);
                    continue;
                }
                _ => self.read_node(tag, &strings, header.reference_width)?,
            };

            let kind = data.kind();
            let id = if let Some(tree) = tree.as_mut() {
                let &(parent, _) = parents
                    .last()
                    .ok_or_else(|| malformed("more than one top-level node"))?;
                tree.append_child(parent, data)
                    .map_err(|e| malformed(e.to_string()))?
            } else {
                let (root, id) = B::create_root(data);
                tree = Some(root);
                id
            };
            last = Some((id, kind));
            nodes += 1;
        }

        if !parents.is_empty() {
            return Err(malformed(format!(
                "end of stream with {} children block(s) still open",
                parents.len()
            )));
        }

        debug!(nodes, strings = strings.len(), "read BMX document");
        Ok(tree)
    }

    /// Payload of a STRING record
    fn read_string(&mut self, length_width: u8, index: u32) -> Result<String, BmxError> {
        let len = read_uint(&mut self.reader, length_width)? as u64;
        let mut bytes = Vec::new();
        // take() keeps a corrupt length from allocating more than the stream holds
        (&mut self.reader).take(len).read_to_end(&mut bytes)?;
        if (bytes.len() as u64) < len {
            return Err(FormatError::UnexpectedEof.into());
        }
        String::from_utf8(bytes).map_err(|_| FormatError::InvalidUtf8(index).into())
    }

    /// Table reference, resolved through the strings read so far
    fn read_ref(&mut self, strings: &ReaderStringTable, width: u8) -> Result<Option<String>, BmxError> {
        let index = read_uint(&mut self.reader, width)?;
        Ok(strings.get_owned(index)?)
    }

    /// Fixed payload of a node record
    fn read_node(
        &mut self,
        tag: Tag,
        strings: &ReaderStringTable,
        width: u8,
    ) -> Result<NodeData, BmxError> {
        let data = match tag {
            Tag::CData => NodeData::CData(self.read_ref(strings, width)?),
            Tag::Comment => NodeData::Comment(self.read_ref(strings, width)?),
            Tag::Container => NodeData::Container,
            Tag::Document => NodeData::Document,
            Tag::DocumentType => NodeData::DocumentType {
                qualified_name: self.read_ref(strings, width)?,
                public_id: self.read_ref(strings, width)?,
                system_id: self.read_ref(strings, width)?,
            },
            Tag::Element => {
                let namespace_uri = self.read_ref(strings, width)?;
                let tag_name = self
                    .read_ref(strings, width)?
                    .ok_or_else(|| malformed("element without tag name"))?;
                let count = self.reader.read_u32::<BigEndian>()?;
                let mut attributes = Vec::with_capacity((count as usize).min(64));
                for _ in 0..count {
                    let name = self
                        .read_ref(strings, width)?
                        .ok_or_else(|| malformed("attribute without name"))?;
                    let value = self.read_ref(strings, width)?;
                    attributes.push(Attribute { name, value });
                }
                NodeData::Element(Element {
                    namespace_uri,
                    tag_name,
                    attributes,
                })
            }
            Tag::EntityReference => NodeData::EntityReference(self.read_ref(strings, width)?),
            Tag::ProcessingInstruction => NodeData::ProcessingInstruction {
                target: self.read_ref(strings, width)?,
                data: self.read_ref(strings, width)?,
            },
            Tag::Text => NodeData::Text {
                content: self.read_ref(strings, width)?,
                ignorable_whitespace: self.reader.read_u8()? != 0,
            },
            Tag::String | Tag::ChildrenStart | Tag::ChildrenEnd | Tag::Eof => {
                return Err(malformed(format!("{:?} is not a node record", tag)));
            }
        };
        Ok(data)
    }
}

/// Decode a tree from bytes
pub fn decode(bytes: &[u8]) -> Result<Option<Tree>, BmxError> {
    BmxReader::new(bytes).read_tree()
}

/// Decode a tree from a file
///
/// The file is opened and closed here, also when reading fails.
pub fn read_file<P: AsRef<Path>>(path: P) -> Result<Option<Tree>, BmxError> {
    let file = File::open(path).map_err(BmxError::Io)?;
    BmxReader::new(file).read_tree()
}
