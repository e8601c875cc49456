//! Gamepad HID Report Descriptor Registry
//!
//! Holds the report map advertised to the host and cross-checks it against
//! the codec's byte layout once, before any session may advertise.
//!
//! The check walks the descriptor's short items, tracks the Report Size /
//! Report Count globals and lays every Input main item end to end. The sum
//! must equal [`REPORT_LEN`] and every codec field boundary must fall on an
//! Input item boundary. Report IDs are rejected: they would prefix the
//! report with an extra byte the codec does not emit.

use crate::domain::codec::{ReportField, REPORT_LAYOUT, REPORT_LEN};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

/// Report map for the 20-byte gamepad input report.
#[rustfmt::skip]
pub const GAMEPAD_REPORT_DESCRIPTOR: &[u8] = &[
    0x05, 0x01,       // Usage Page (Generic Desktop)
    0x09, 0x05,       // Usage (Game Pad)
    0xA1, 0x01,       // Collection (Application)

    // Buttons 1-10 + 6 bits padding
    0x05, 0x09,       //   Usage Page (Button)
    0x19, 0x01,       //   Usage Minimum (1)
    0x29, 0x0A,       //   Usage Maximum (10)
    0x15, 0x00,       //   Logical Minimum (0)
    0x25, 0x01,       //   Logical Maximum (1)
    0x75, 0x01,       //   Report Size (1)
    0x95, 0x0A,       //   Report Count (10)
    0x81, 0x02,       //   Input (Data, Var, Abs)
    0x95, 0x06,       //   Report Count (6)
    0x81, 0x03,       //   Input (Const, Var, Abs)

    // Triggers
    0x05, 0x01,       //   Usage Page (Generic Desktop)
    0x09, 0x32,       //   Usage (Z)
    0x09, 0x35,       //   Usage (Rz)
    0x15, 0x00,       //   Logical Minimum (0)
    0x26, 0xFF, 0x00, //   Logical Maximum (255)
    0x75, 0x08,       //   Report Size (8)
    0x95, 0x02,       //   Report Count (2)
    0x81, 0x02,       //   Input (Data, Var, Abs)

    // Sticks
    0x09, 0x30,       //   Usage (X)
    0x09, 0x31,       //   Usage (Y)
    0x09, 0x33,       //   Usage (Rx)
    0x09, 0x34,       //   Usage (Ry)
    0x95, 0x04,       //   Report Count (4)
    0x81, 0x02,       //   Input (Data, Var, Abs)

    // D-pad
    0x09, 0x39,       //   Usage (Hat switch)
    0x25, 0x07,       //   Logical Maximum (7)
    0x35, 0x00,       //   Physical Minimum (0)
    0x46, 0x3B, 0x01, //   Physical Maximum (315)
    0x65, 0x14,       //   Unit (Eng Rot: Degree)
    0x95, 0x01,       //   Report Count (1)
    0x81, 0x42,       //   Input (Data, Var, Abs, Null State)
    0x65, 0x00,       //   Unit (None)

    // Reserved
    0x95, 0x0B,       //   Report Count (11)
    0x81, 0x03,       //   Input (Const, Var, Abs)

    0xC0,             // End Collection
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LayoutError {
    #[error("descriptor item at offset {offset} runs past the end of the descriptor")]
    Truncated { offset: usize },

    #[error("long item at offset {offset} is not supported")]
    LongItem { offset: usize },

    #[error("descriptor declares Report ID {id}; the report codec emits unnumbered reports")]
    ReportId { id: u32 },

    #[error("descriptor declares a {declared_bits}-bit input report, codec emits {expected_bits} bits")]
    SizeMismatch {
        declared_bits: usize,
        expected_bits: usize,
    },

    #[error("input item at offset {offset} overflows the report bit counter")]
    Oversize { offset: usize },

    #[error("codec field '{field}' boundary at bit {bit} splits a descriptor input item")]
    Misaligned { field: &'static str, bit: usize },
}

/// One Input main item, positioned within the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputItem {
    pub bit_offset: usize,
    pub report_size: u32,
    pub report_count: u32,
    pub constant: bool,
}

impl InputItem {
    pub fn bit_len(&self) -> usize {
        let bits = u64::from(self.report_size) * u64::from(self.report_count);
        usize::try_from(bits).unwrap_or(usize::MAX)
    }
}

const ITEM_TYPE_MAIN: u8 = 0;
const ITEM_TYPE_GLOBAL: u8 = 1;
const TAG_INPUT: u8 = 0x08;
const TAG_REPORT_SIZE: u8 = 0x07;
const TAG_REPORT_ID: u8 = 0x08;
const TAG_REPORT_COUNT: u8 = 0x09;
const LONG_ITEM_PREFIX: u8 = 0xFE;

/// Walk a report descriptor and position every Input item.
pub fn parse_input_items(data: &[u8]) -> Result<Vec<InputItem>, LayoutError> {
    let mut items = Vec::new();
    let mut report_size: u32 = 0;
    let mut report_count: u32 = 0;
    let mut bit_offset: usize = 0;

    let mut i = 0;
    while i < data.len() {
        let prefix = data[i];
        if prefix == LONG_ITEM_PREFIX {
            return Err(LayoutError::LongItem { offset: i });
        }

        let tag = (prefix >> 4) & 0x0F;
        let item_type = (prefix >> 2) & 0x03;
        let size = match prefix & 0x03 {
            0 => 0,
            1 => 1,
            2 => 2,
            _ => 4,
        };

        if i + 1 + size > data.len() {
            return Err(LayoutError::Truncated { offset: i });
        }

        let value = data[i + 1..i + 1 + size]
            .iter()
            .rev()
            .fold(0u32, |acc, b| (acc << 8) | *b as u32);

        match (item_type, tag) {
            (ITEM_TYPE_MAIN, TAG_INPUT) => {
                let item = InputItem {
                    bit_offset,
                    report_size,
                    report_count,
                    constant: value & 0x01 != 0,
                };
                bit_offset = bit_offset
                    .checked_add(item.bit_len())
                    .ok_or(LayoutError::Oversize { offset: i })?;
                items.push(item);
            }
            (ITEM_TYPE_GLOBAL, TAG_REPORT_SIZE) => report_size = value,
            (ITEM_TYPE_GLOBAL, TAG_REPORT_COUNT) => report_count = value,
            (ITEM_TYPE_GLOBAL, TAG_REPORT_ID) => return Err(LayoutError::ReportId { id: value }),
            _ => {}
        }

        i += 1 + size;
    }

    Ok(items)
}

/// Check a descriptor against a codec layout of `report_len` bytes.
pub fn validate_layout(
    descriptor: &[u8],
    layout: &[ReportField],
    report_len: usize,
) -> Result<(), LayoutError> {
    let items = parse_input_items(descriptor)?;

    let declared_bits: usize = items.iter().map(InputItem::bit_len).sum();
    let expected_bits = report_len * 8;
    if declared_bits != expected_bits {
        return Err(LayoutError::SizeMismatch {
            declared_bits,
            expected_bits,
        });
    }

    let boundaries: Vec<usize> = items
        .iter()
        .map(|item| item.bit_offset)
        .chain(std::iter::once(declared_bits))
        .collect();

    for field in layout {
        for bit in [field.offset * 8, field.end() * 8] {
            if !boundaries.contains(&bit) {
                return Err(LayoutError::Misaligned {
                    field: field.name,
                    bit,
                });
            }
        }
    }

    Ok(())
}

/// The validated report map shared by every session in the process.
///
/// Only constructible through a validating constructor, so holding one is
/// proof the descriptor agrees with the codec.
#[derive(Debug, Clone)]
pub struct DescriptorRegistry {
    bytes: Arc<[u8]>,
}

impl DescriptorRegistry {
    /// Registry for the built-in gamepad descriptor.
    pub fn standard() -> Result<Self, LayoutError> {
        Self::from_bytes(GAMEPAD_REPORT_DESCRIPTOR)
    }

    /// Registry for an arbitrary descriptor, validated against the codec.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, LayoutError> {
        validate_layout(bytes, &REPORT_LAYOUT, REPORT_LEN)?;
        debug!(len = bytes.len(), "HID report descriptor validated");
        info!("Report descriptor matches {}-byte input report", REPORT_LEN);
        Ok(Self {
            bytes: Arc::from(bytes),
        })
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}
