//! BMX wire format: magic, record tags, byte widths and the stream header
//!
//! Layout (big-endian throughout):
//!
//! ```text
//! 0   magic            4 bytes  "BMX1"
//! 4   settings         u32      bitmask, see Settings
//! 8   string count     u32      number of STRING records in the body
//! 12  reference width  u8       1, 2 or 4
//! 13  length width     u8       1, 2 or 4
//! 14  body             tagged records, terminated by EOF
//! ```

use std::io::{self, Read, Write};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use super::error::{BmxError, FormatError};
use super::settings::Settings;
use crate::dom::NodeKind;

/// Version magic of format v1 - 4 ASCII bytes
pub const MAGIC: [u8; 4] = *b"BMX1";

/// Size of the fixed header in bytes
pub const HEADER_LEN: usize = 14;

/// One-byte record tag preceding every body record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Tag {
    CData = 0x01,
    Comment = 0x02,
    Container = 0x03,
    Document = 0x04,
    DocumentType = 0x05,
    Element = 0x06,
    EntityReference = 0x07,
    ProcessingInstruction = 0x08,
    Text = 0x09,
    /// String table definition, not a node
    String = 0x0A,
    /// Following records are children of the last node
    ChildrenStart = 0x7B,
    /// Closes the innermost ChildrenStart
    ChildrenEnd = 0x7D,
    Eof = 0xFF,
}

impl Tag {
    /// Decode a tag byte; None for unassigned values
    pub fn from_byte(b: u8) -> Option<Tag> {
        Some(match b {
            0x01 => Tag::CData,
            0x02 => Tag::Comment,
            0x03 => Tag::Container,
            0x04 => Tag::Document,
            0x05 => Tag::DocumentType,
            0x06 => Tag::Element,
            0x07 => Tag::EntityReference,
            0x08 => Tag::ProcessingInstruction,
            0x09 => Tag::Text,
            0x0A => Tag::String,
            0x7B => Tag::ChildrenStart,
            0x7D => Tag::ChildrenEnd,
            0xFF => Tag::Eof,
            _ => return None,
        })
    }

    #[inline]
    pub fn byte(self) -> u8 {
        self as u8
    }
}

impl From<NodeKind> for Tag {
    fn from(kind: NodeKind) -> Self {
        match kind {
            NodeKind::Document => Tag::Document,
            NodeKind::Container => Tag::Container,
            NodeKind::Element => Tag::Element,
            NodeKind::Text => Tag::Text,
            NodeKind::CData => Tag::CData,
            NodeKind::Comment => Tag::Comment,
            NodeKind::DocumentType => Tag::DocumentType,
            NodeKind::EntityReference => Tag::EntityReference,
            NodeKind::ProcessingInstruction => Tag::ProcessingInstruction,
        }
    }
}

/// Smallest of 1, 2 or 4 bytes able to hold `max_value`
#[inline]
pub fn width_for(max_value: usize) -> u8 {
    if max_value <= u8::MAX as usize {
        1
    } else if max_value <= u16::MAX as usize {
        2
    } else {
        4
    }
}

/// Check a width byte read from a header
#[inline]
pub fn is_valid_width(width: u8) -> bool {
    matches!(width, 1 | 2 | 4)
}

/// Write `value` as a big-endian integer of `width` bytes
pub fn write_uint<W: Write>(w: &mut W, value: u32, width: u8) -> io::Result<()> {
    match width {
        1 => w.write_u8(value as u8),
        2 => w.write_u16::<BigEndian>(value as u16),
        _ => w.write_u32::<BigEndian>(value),
    }
}

/// Read a big-endian integer of `width` bytes
pub fn read_uint<R: Read>(r: &mut R, width: u8) -> io::Result<u32> {
    match width {
        1 => r.read_u8().map(u32::from),
        2 => r.read_u16::<BigEndian>().map(u32::from),
        _ => r.read_u32::<BigEndian>(),
    }
}

/// Stream header: settings plus the string table metadata the body depends on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub settings: Settings,
    /// Number of STRING records in the body (the null slot is not counted)
    pub string_count: u32,
    /// Width of every string reference in node payloads
    pub reference_width: u8,
    /// Width of the length prefix of every STRING record
    pub length_width: u8,
}

impl Header {
    /// Write the 14-byte header
    pub fn write<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_all(&MAGIC)?;
        w.write_u32::<BigEndian>(self.settings.storage_value())?;
        w.write_u32::<BigEndian>(self.string_count)?;
        w.write_u8(self.reference_width)?;
        w.write_u8(self.length_width)?;
        Ok(())
    }

    /// Read and validate the 14-byte header
    ///
    /// The magic is checked before anything else is read.
    pub fn read<R: Read>(r: &mut R) -> Result<Self, BmxError> {
        let mut magic = [0u8; 4];
        r.read_exact(&mut magic)?;
        if magic != MAGIC {
            return Err(FormatError::BadMagic(magic).into());
        }

        let settings = Settings::from_wire(r.read_u32::<BigEndian>()?)?;
        let string_count = r.read_u32::<BigEndian>()?;
        let reference_width = r.read_u8()?;
        let length_width = r.read_u8()?;

        for width in [reference_width, length_width] {
            if !is_valid_width(width) {
                return Err(FormatError::InvalidWidth(width).into());
            }
        }
        if width_for(string_count as usize) > reference_width {
            return Err(FormatError::Malformed(format!(
                "{} strings cannot be addressed with {}-byte references",
                string_count, reference_width
            ))
            .into());
        }

        Ok(Header {
            settings,
            string_count,
            reference_width,
            length_width,
        })
    }
}
