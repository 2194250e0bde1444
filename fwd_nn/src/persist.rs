//! Binary persistence of unit trees.
//!
//! Every record starts with an `i32` [`UnitTag`] followed by the unit's
//! payload. All integers are `i32` and all values `f32`, little-endian:
//!
//! | tag | payload                                                         |
//! |-----|-----------------------------------------------------------------|
//! | 0   | child count, then one full record per child                     |
//! | 1   | out, in, `out*in` weights (row per output), `out` biases         |
//! | 2   | rank, kernel dims, input dims, output dims, kernel values        |
//!
//! Loading does not validate beyond what construction requires, so a file
//! written by [`save_to_file`] loads back with identical behaviour. Element
//! counts that overflow and composites nested deeper than [`MAX_DEPTH`] are
//! rejected as [`NnError::UnsupportedFormat`].

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use log::debug;

use crate::error::{NnError, Result};
use crate::layers::{Affine, Composite, Convolution};
use crate::unit::Unit;

/// Discriminant written before every unit record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnitTag {
    Composite = 0,
    Affine = 1,
    Convolution = 2,
}

impl TryFrom<i32> for UnitTag {
    type Error = NnError;

    fn try_from(tag: i32) -> Result<Self> {
        match tag {
            0 => Ok(UnitTag::Composite),
            1 => Ok(UnitTag::Affine),
            2 => Ok(UnitTag::Convolution),
            other => Err(NnError::UnsupportedFormat(format!(
                "unknown unit tag {}",
                other
            ))),
        }
    }
}

/// Write `unit` as a tagged record.
pub fn write_unit(unit: &dyn Unit, writer: &mut dyn Write) -> Result<()> {
    write_i32(writer, unit.tag() as i32)?;
    unit.write_payload(writer)
}

/// Deepest composite nesting accepted when reading.
pub const MAX_DEPTH: usize = 64;

/// Read one tagged record, recursing into composite children.
pub fn read_unit(reader: &mut dyn Read) -> Result<Box<dyn Unit>> {
    read_unit_at(reader, 0)
}

pub(crate) fn read_unit_at(reader: &mut dyn Read, depth: usize) -> Result<Box<dyn Unit>> {
    if depth > MAX_DEPTH {
        return Err(NnError::UnsupportedFormat(format!(
            "units nested deeper than {}",
            MAX_DEPTH
        )));
    }
    let tag = UnitTag::try_from(read_i32(reader)?)?;
    let unit: Box<dyn Unit> = match tag {
        UnitTag::Composite => Box::new(Composite::read_payload(reader, depth)?),
        UnitTag::Affine => Box::new(Affine::read_payload(reader)?),
        UnitTag::Convolution => Box::new(Convolution::read_payload(reader)?),
    };
    Ok(unit)
}

/// Save a unit tree to `path`, replacing any existing file.
pub fn save_to_file<P: AsRef<Path>>(unit: &dyn Unit, path: P) -> Result<()> {
    let path = path.as_ref();
    let mut writer = BufWriter::new(File::create(path)?);
    write_unit(unit, &mut writer)?;
    writer.flush()?;
    debug!(
        "saved {:?} unit with {} parameters to {}",
        unit.tag(),
        unit.variable_count(),
        path.display()
    );
    Ok(())
}

/// Load a unit tree previously written by [`save_to_file`].
pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Box<dyn Unit>> {
    let path = path.as_ref();
    let mut reader = BufReader::new(File::open(path)?);
    let unit = read_unit(&mut reader)?;
    debug!(
        "loaded {:?} unit with {} parameters from {}",
        unit.tag(),
        unit.variable_count(),
        path.display()
    );
    Ok(unit)
}

pub(crate) fn read_i32(reader: &mut dyn Read) -> Result<i32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(i32::from_le_bytes(buf))
}

/// Read a count or dimension; negative values are rejected.
pub(crate) fn read_len(reader: &mut dyn Read) -> Result<usize> {
    let value = read_i32(reader)?;
    usize::try_from(value)
        .map_err(|_| NnError::UnsupportedFormat(format!("negative length {}", value)))
}

pub(crate) fn read_f32s(reader: &mut dyn Read, n: usize) -> Result<Vec<f32>> {
    // Untrusted length: cap the reservation, EOF ends a short file.
    let mut values = Vec::with_capacity(n.min(1 << 16));
    let mut buf = [0u8; 4];
    for _ in 0..n {
        reader.read_exact(&mut buf)?;
        values.push(f32::from_le_bytes(buf));
    }
    Ok(values)
}

pub(crate) fn write_i32(writer: &mut dyn Write, value: i32) -> Result<()> {
    writer.write_all(&value.to_le_bytes())?;
    Ok(())
}

pub(crate) fn write_len(writer: &mut dyn Write, len: usize) -> Result<()> {
    let value = i32::try_from(len)
        .map_err(|_| NnError::UnsupportedFormat(format!("length {} exceeds i32", len)))?;
    write_i32(writer, value)
}

pub(crate) fn write_f32s(writer: &mut dyn Write, values: &[f32]) -> Result<()> {
    for v in values {
        writer.write_all(&v.to_le_bytes())?;
    }
    Ok(())
}
