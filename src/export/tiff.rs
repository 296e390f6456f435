//! Minimal little-endian TIFF writer with in-place multi-page append
//!
//! Each page is one strip. A page is laid out as strip data, then any
//! out-of-line tag values, then its IFD. Appending writes that block at the
//! end of an existing file and patches the previous last IFD's next-offset.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

use super::format::TiffWriteMode;

const TYPE_SHORT: u16 = 3;
const TYPE_LONG: u16 = 4;
const TYPE_RATIONAL: u16 = 5;

const TAG_IMAGE_WIDTH: u16 = 256;
const TAG_IMAGE_LENGTH: u16 = 257;
const TAG_BITS_PER_SAMPLE: u16 = 258;
const TAG_COMPRESSION: u16 = 259;
const TAG_PHOTOMETRIC: u16 = 262;
const TAG_STRIP_OFFSETS: u16 = 273;
const TAG_SAMPLES_PER_PIXEL: u16 = 277;
const TAG_ROWS_PER_STRIP: u16 = 278;
const TAG_STRIP_BYTE_COUNTS: u16 = 279;
const TAG_X_RESOLUTION: u16 = 282;
const TAG_Y_RESOLUTION: u16 = 283;
const TAG_PLANAR_CONFIG: u16 = 284;
const TAG_T4_OPTIONS: u16 = 292;
const TAG_T6_OPTIONS: u16 = 293;
const TAG_RESOLUTION_UNIT: u16 = 296;
const TAG_EXTRA_SAMPLES: u16 = 338;
const TAG_YCBCR_SUBSAMPLING: u16 = 530;

/// Photometric interpretations used by the encoders
pub(crate) const PHOTOMETRIC_WHITE_IS_ZERO: u16 = 0;
pub(crate) const PHOTOMETRIC_BLACK_IS_ZERO: u16 = 1;
pub(crate) const PHOTOMETRIC_RGB: u16 = 2;
pub(crate) const PHOTOMETRIC_YCBCR: u16 = 6;

/// Safety bound on IFD chains when appending
const MAX_PAGES: usize = 65_536;

/// One encoded page
#[derive(Debug, Clone)]
pub(crate) struct TiffImage {
    pub width: u32,
    pub height: u32,
    pub bits_per_sample: u16,
    pub samples_per_pixel: u16,
    pub photometric: u16,
    pub compression: u16,
    /// Last sample is unassociated alpha
    pub alpha: bool,
    pub dpi: f32,
    pub strip: Vec<u8>,
}

struct Entry {
    tag: u16,
    kind: u16,
    count: u32,
    value: Vec<u8>,
}

impl Entry {
    fn shorts(tag: u16, values: &[u16]) -> Self {
        Entry {
            tag,
            kind: TYPE_SHORT,
            count: values.len() as u32,
            value: values.iter().flat_map(|v| v.to_le_bytes()).collect(),
        }
    }

    fn long(tag: u16, value: u32) -> Self {
        Entry {
            tag,
            kind: TYPE_LONG,
            count: 1,
            value: value.to_le_bytes().to_vec(),
        }
    }

    fn rational(tag: u16, numerator: u32, denominator: u32) -> Self {
        let mut value = numerator.to_le_bytes().to_vec();
        value.extend_from_slice(&denominator.to_le_bytes());
        Entry {
            tag,
            kind: TYPE_RATIONAL,
            count: 1,
            value,
        }
    }
}

/// Serialize strip, out-of-line values and IFD for a page placed at `base`
///
/// Returns the bytes and the offset (absolute) of the IFD. Fails when any
/// offset would not fit the 32-bit TIFF offset space.
fn page_block(image: &TiffImage, base: u32) -> io::Result<(Vec<u8>, u32)> {
    let strip_len = u32::try_from(image.strip.len()).map_err(|_| too_large())?;
    let mut block = image.strip.clone();
    if block.len() % 2 == 1 {
        block.push(0);
    }

    // Resolution as dpi * 100 / 100 keeps two decimals
    let dpi = (image.dpi.max(1.0) * 100.0).round() as u32;

    let mut entries = vec![
        Entry::long(TAG_IMAGE_WIDTH, image.width),
        Entry::long(TAG_IMAGE_LENGTH, image.height),
        Entry::shorts(
            TAG_BITS_PER_SAMPLE,
            &vec![image.bits_per_sample; image.samples_per_pixel as usize],
        ),
        Entry::shorts(TAG_COMPRESSION, &[image.compression]),
        Entry::shorts(TAG_PHOTOMETRIC, &[image.photometric]),
        Entry::long(TAG_STRIP_OFFSETS, base),
        Entry::shorts(TAG_SAMPLES_PER_PIXEL, &[image.samples_per_pixel]),
        Entry::long(TAG_ROWS_PER_STRIP, image.height),
        Entry::long(TAG_STRIP_BYTE_COUNTS, strip_len),
        Entry::rational(TAG_X_RESOLUTION, dpi, 100),
        Entry::rational(TAG_Y_RESOLUTION, dpi, 100),
        Entry::shorts(TAG_PLANAR_CONFIG, &[1]),
        Entry::shorts(TAG_RESOLUTION_UNIT, &[2]),
    ];
    match image.compression {
        3 => entries.push(Entry::long(TAG_T4_OPTIONS, 0)),
        4 => entries.push(Entry::long(TAG_T6_OPTIONS, 0)),
        _ => {}
    }
    if image.alpha {
        entries.push(Entry::shorts(TAG_EXTRA_SAMPLES, &[2]));
    }
    if image.photometric == PHOTOMETRIC_YCBCR {
        entries.push(Entry::shorts(TAG_YCBCR_SUBSAMPLING, &[1, 1]));
    }
    entries.sort_by_key(|e| e.tag);

    // Out-of-line values go between the strip and the IFD
    let mut inline: Vec<[u8; 4]> = Vec::with_capacity(entries.len());
    for entry in &entries {
        let mut field = [0u8; 4];
        if entry.value.len() <= 4 {
            field[..entry.value.len()].copy_from_slice(&entry.value);
        } else {
            field = offset_after(base, block.len())?.to_le_bytes();
            block.extend_from_slice(&entry.value);
            if block.len() % 2 == 1 {
                block.push(0);
            }
        }
        inline.push(field);
    }

    let ifd_offset = offset_after(base, block.len())?;
    block.extend_from_slice(&(entries.len() as u16).to_le_bytes());
    for (entry, field) in entries.iter().zip(&inline) {
        block.extend_from_slice(&entry.tag.to_le_bytes());
        block.extend_from_slice(&entry.kind.to_le_bytes());
        block.extend_from_slice(&entry.count.to_le_bytes());
        block.extend_from_slice(field);
    }
    block.extend_from_slice(&0u32.to_le_bytes());
    // The IFD itself must end inside the offset space too
    offset_after(base, block.len())?;

    Ok((block, ifd_offset))
}

fn too_large() -> io::Error {
    invalid("TIFF exceeds 4 GiB")
}

/// Absolute offset of `len` bytes past `base`
fn offset_after(base: u32, len: usize) -> io::Result<u32> {
    u32::try_from(len)
        .ok()
        .and_then(|len| base.checked_add(len))
        .ok_or_else(too_large)
}

/// A complete single-page file
pub(crate) fn to_bytes(image: &TiffImage) -> io::Result<Vec<u8>> {
    let (block, ifd_offset) = page_block(image, 8)?;
    let mut out = Vec::with_capacity(8 + block.len());
    out.extend_from_slice(b"II");
    out.extend_from_slice(&42u16.to_le_bytes());
    out.extend_from_slice(&ifd_offset.to_le_bytes());
    out.extend_from_slice(&block);
    Ok(out)
}

/// Write `image` to `path`, appending a page or replacing the file
pub(crate) fn write(path: &Path, image: &TiffImage, mode: TiffWriteMode) -> io::Result<()> {
    let has_pages = matches!(mode, TiffWriteMode::Append)
        && std::fs::metadata(path).map(|m| m.len() > 0).unwrap_or(false);
    if !has_pages {
        return std::fs::write(path, to_bytes(image)?);
    }

    let mut file = OpenOptions::new().read(true).write(true).open(path)?;
    let next_slot = last_next_offset(&mut file)?;

    let mut base = file.seek(SeekFrom::End(0))?;
    if base % 2 == 1 {
        file.write_all(&[0])?;
        base += 1;
    }
    let base = u32::try_from(base).map_err(|_| too_large())?;

    let (block, ifd_offset) = page_block(image, base)?;
    file.write_all(&block)?;
    file.seek(SeekFrom::Start(next_slot))?;
    file.write_all(&ifd_offset.to_le_bytes())?;
    file.flush()
}

/// Number of pages (IFDs) in a little-endian TIFF
pub fn page_count(path: &Path) -> io::Result<usize> {
    let mut file = File::open(path)?;
    Ok(walk_ifds(&mut file)?.len())
}

fn invalid(msg: &str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg.to_string())
}

fn read_u16(file: &mut File) -> io::Result<u16> {
    let mut buf = [0u8; 2];
    file.read_exact(&mut buf)?;
    Ok(u16::from_le_bytes(buf))
}

fn read_u32(file: &mut File) -> io::Result<u32> {
    let mut buf = [0u8; 4];
    file.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

/// Offsets of the next-IFD field of every IFD, in chain order
fn walk_ifds(file: &mut File) -> io::Result<Vec<u64>> {
    file.seek(SeekFrom::Start(0))?;
    let mut order = [0u8; 2];
    file.read_exact(&mut order)?;
    if &order != b"II" {
        return Err(invalid("only little-endian TIFF can be appended to"));
    }
    if read_u16(file)? != 42 {
        return Err(invalid("not a TIFF file"));
    }

    let mut slots = Vec::new();
    let mut offset = read_u32(file)? as u64;
    while offset != 0 {
        if slots.len() >= MAX_PAGES {
            return Err(invalid("IFD chain does not terminate"));
        }
        file.seek(SeekFrom::Start(offset))?;
        let count = read_u16(file)? as u64;
        let slot = offset + 2 + count * 12;
        file.seek(SeekFrom::Start(slot))?;
        offset = read_u32(file)? as u64;
        slots.push(slot);
    }
    Ok(slots)
}

/// Position of the field to patch when adding a page
fn last_next_offset(file: &mut File) -> io::Result<u64> {
    let slots = walk_ifds(file)?;
    // A header with no IFDs: patch the header's first-IFD field
    Ok(slots.last().copied().unwrap_or(4))
}
