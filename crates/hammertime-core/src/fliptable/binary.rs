//! Legacy binary fliptable layout.
//!
//! Compiled consumers `mmap` these files and index them directly, so the
//! layout is fixed. All integers are little-endian.
//!
//! ```text
//! offset 0    header (56 bytes)
//!             magic u32, dist u32, size u64,
//!             range_off u64, hammer_off u64, flip_off u64,
//!             num_ranges u32, num_hammers u32, num_flips u32, pad u32
//! range_off   Range records    (16 bytes each)
//! hammer_off  Hammering records (8 bytes each)
//! flip_off    Flip records     (12 bytes each)
//! ```
//!
//! Every section starts at a multiple of [`FLIPTBL_FILE_ALIGN`]. Targets are
//! not stored per attack: a range covers consecutive rows of one bank, the
//! n-th hammering of a range hammers `start + n` and `start + n + dist`.

use std::fs::File;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::Path;

use log::{debug, info};
use serde::Serialize;

use crate::fliptable::attack::{byte_masks, mask_flips};
use crate::fliptable::{Attack, Flip, FlipTable, Targets};
use crate::memory::DRAMAddr;
use crate::util::{FLIPTBL_FILE_ALIGN, FLIPTBL_FILE_MAGIC, align_up};
use crate::{Error, Result};

/// Size of the file header in bytes
pub const HEADER_SIZE: u64 = 56;
/// Size of one range record in bytes
pub const RANGE_SIZE: u64 = 16;
/// Size of one hammering record in bytes
pub const HAMMERING_SIZE: u64 = 8;
/// Size of one flip record in bytes
pub const FLIP_RECORD_SIZE: u64 = 12;

/// A maximal run of attacks on consecutive rows of one bank.
#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
pub struct Range {
    /// First target row of the run
    pub start: DRAMAddr,
    /// Number of hammerings (one per row)
    pub num_hammers: u32,
    /// Index of the first hammering in the hammering table
    pub ham_idx: u32,
}

/// The flips of one attack, as a slice of the flip table.
#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
pub struct Hammering {
    /// Number of flip records
    pub num_flips: u32,
    /// Index of the first flip record in the flip table
    pub flip_idx: u32,
}

/// All flips in one byte of one cell.
#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
pub struct FlipRecord {
    /// Cell containing the byte
    pub location: DRAMAddr,
    /// Byte index within the cell
    pub cell_byte: u16,
    /// Bits that flipped from 0 to 1
    pub pullup: u8,
    /// Bits that flipped from 1 to 0
    pub pulldown: u8,
}

impl FlipRecord {
    /// Expands the record into single bit flips.
    pub fn flips(&self) -> impl Iterator<Item = Flip> + use<> {
        mask_flips(
            self.location,
            self.cell_byte as u32,
            self.pullup,
            self.pulldown,
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Header {
    magic: u32,
    dist: u32,
    size: u64,
    range_off: u64,
    hammer_off: u64,
    flip_off: u64,
    num_ranges: u32,
    num_hammers: u32,
    num_flips: u32,
}

impl Header {
    fn layout(dist: u32, num_ranges: u32, num_hammers: u32, num_flips: u32) -> Self {
        let range_off = align_up(HEADER_SIZE, FLIPTBL_FILE_ALIGN);
        let hammer_off = align_up(range_off + num_ranges as u64 * RANGE_SIZE, FLIPTBL_FILE_ALIGN);
        let flip_off = align_up(
            hammer_off + num_hammers as u64 * HAMMERING_SIZE,
            FLIPTBL_FILE_ALIGN,
        );
        Header {
            magic: FLIPTBL_FILE_MAGIC,
            dist,
            size: flip_off + num_flips as u64 * FLIP_RECORD_SIZE,
            range_off,
            hammer_off,
            flip_off,
            num_ranges,
            num_hammers,
            num_flips,
        }
    }

    fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HEADER_SIZE as usize);
        buf.extend_from_slice(&self.magic.to_le_bytes());
        buf.extend_from_slice(&self.dist.to_le_bytes());
        for v in [self.size, self.range_off, self.hammer_off, self.flip_off] {
            buf.extend_from_slice(&v.to_le_bytes());
        }
        for v in [self.num_ranges, self.num_hammers, self.num_flips, 0] {
            buf.extend_from_slice(&v.to_le_bytes());
        }
        buf
    }

    fn decode(buf: &[u8]) -> Result<Self> {
        if (buf.len() as u64) < HEADER_SIZE {
            return Err(Error::Format(format!(
                "file too short for header: {} bytes",
                buf.len()
            )));
        }
        let mut r = LeReader::new(buf);
        let header = Header {
            magic: r.u32(),
            dist: r.u32(),
            size: r.u64(),
            range_off: r.u64(),
            hammer_off: r.u64(),
            flip_off: r.u64(),
            num_ranges: r.u32(),
            num_hammers: r.u32(),
            num_flips: r.u32(),
        };
        if header.magic != FLIPTBL_FILE_MAGIC {
            return Err(Error::Format(format!("bad magic {:#010x}", header.magic)));
        }
        if header.size != buf.len() as u64 {
            return Err(Error::Format(format!(
                "header size {} does not match file size {}",
                header.size,
                buf.len()
            )));
        }
        let sections = [
            ("range", header.range_off, header.num_ranges, RANGE_SIZE),
            ("hammering", header.hammer_off, header.num_hammers, HAMMERING_SIZE),
            ("flip", header.flip_off, header.num_flips, FLIP_RECORD_SIZE),
        ];
        for (name, off, count, size) in sections {
            if off % FLIPTBL_FILE_ALIGN != 0 || off < HEADER_SIZE {
                return Err(Error::Format(format!("misaligned {} section at {}", name, off)));
            }
            let end = (count as u64)
                .checked_mul(size)
                .and_then(|n| off.checked_add(n));
            if end.is_none_or(|end| end > header.size) {
                return Err(Error::Format(format!(
                    "{} section ({} records at {}) exceeds file size {}",
                    name, count, off, header.size
                )));
            }
        }
        Ok(header)
    }
}

/// Sequential little-endian reader over a validated buffer.
struct LeReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> LeReader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        LeReader { buf, pos: 0 }
    }

    fn at(buf: &'a [u8], pos: u64) -> Self {
        LeReader {
            buf,
            pos: pos as usize,
        }
    }

    fn take<const N: usize>(&mut self) -> [u8; N] {
        let mut out = [0u8; N];
        out.copy_from_slice(&self.buf[self.pos..self.pos + N]);
        self.pos += N;
        out
    }

    fn u8(&mut self) -> u8 {
        self.take::<1>()[0]
    }

    fn u16(&mut self) -> u16 {
        u16::from_le_bytes(self.take())
    }

    fn u32(&mut self) -> u32 {
        u32::from_le_bytes(self.take())
    }

    fn u64(&mut self) -> u64 {
        u64::from_le_bytes(self.take())
    }

    fn addr(&mut self) -> DRAMAddr {
        DRAMAddr {
            chan: self.u8(),
            dimm: self.u8(),
            rank: self.u8(),
            bank: self.u8(),
            row: self.u16(),
            col: self.u16(),
        }
    }
}

fn put_addr(buf: &mut Vec<u8>, a: &DRAMAddr) {
    buf.extend_from_slice(&[a.chan, a.dimm, a.rank, a.bank]);
    buf.extend_from_slice(&a.row.to_le_bytes());
    buf.extend_from_slice(&a.col.to_le_bytes());
}

/// A fliptable in the legacy range/hammering/flip layout.
#[derive(Clone, Debug, Default, Serialize, PartialEq, Eq)]
pub struct LegacyTable {
    dist: u32,
    ranges: Vec<Range>,
    hammers: Vec<Hammering>,
    flips: Vec<FlipRecord>,
}

fn count(n: usize, what: &str) -> Result<u32> {
    u32::try_from(n).map_err(|_| Error::Format(format!("too many {}: {}", what, n)))
}

impl LegacyTable {
    /// Builds the layout from attacks sorted by targets.
    ///
    /// `dist` overrides the row distance between the two targets; when `None`
    /// it is taken from the first attack. Every attack must then hammer
    /// `first` and `first + dist` in the same bank.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InconsistentTargets`] if an attack does not match the
    /// distance, and [`Error::Format`] if a count or byte index does not fit
    /// the record fields.
    pub fn from_attacks<'a>(
        attacks: impl IntoIterator<Item = &'a Attack>,
        dist: Option<u32>,
    ) -> Result<Self> {
        let mut dist = dist;
        let mut ranges: Vec<Range> = vec![];
        let mut hammers = vec![];
        let mut flips = vec![];
        let mut last: Option<DRAMAddr> = None;

        for atk in attacks {
            let t = atk.targets();
            let d = match dist {
                Some(d) => d,
                None => {
                    let d = u32::try_from(t.row_distance()).map_err(|_| {
                        Error::InconsistentTargets(format!("negative target distance in {}", t))
                    })?;
                    dist = Some(d);
                    d
                }
            };
            let expected = i32::try_from(d)
                .ok()
                .and_then(|d| t.first().checked_add_row(d));
            if expected != Some(t.second()) {
                return Err(Error::InconsistentTargets(format!(
                    "Inconsistent target distance: {}, expected {}",
                    t, d
                )));
            }

            let start = t.first();
            let extends = last.is_some_and(|l| {
                l.same_bank(&start) && l.col == start.col && l.checked_add_row(1) == Some(start)
            });
            if !extends {
                ranges.push(Range {
                    start,
                    num_hammers: 0,
                    ham_idx: count(hammers.len(), "hammerings")?,
                });
            }
            if let Some(range) = ranges.last_mut() {
                range.num_hammers += 1;
            }
            last = Some(start);

            let records = byte_masks(atk.flips())
                .into_iter()
                .map(|m| {
                    Ok(FlipRecord {
                        location: m.addr,
                        cell_byte: u16::try_from(m.cell_byte).map_err(|_| {
                            Error::Format(format!("cell byte {} out of range", m.cell_byte))
                        })?,
                        pullup: m.pullup,
                        pulldown: m.pulldown,
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            hammers.push(Hammering {
                num_flips: count(records.len(), "flip records")?,
                flip_idx: count(flips.len(), "flip records")?,
            });
            flips.extend(records);
        }
        ranges.sort_by_key(|r| r.start);
        count(flips.len(), "flip records")?;

        let table = LegacyTable {
            dist: dist.unwrap_or(0),
            ranges,
            hammers,
            flips,
        };
        debug!(
            "legacy layout: dist {}, {} ranges, {} hammerings, {} flip records",
            table.dist,
            table.ranges.len(),
            table.hammers.len(),
            table.flips.len()
        );
        Ok(table)
    }

    /// Builds the layout of a whole table.
    ///
    /// # Errors
    ///
    /// See [`LegacyTable::from_attacks`].
    pub fn from_fliptable(table: &FlipTable, dist: Option<u32>) -> Result<Self> {
        LegacyTable::from_attacks(table.iter(), dist)
    }

    /// Row distance between the two targets of every attack.
    pub fn dist(&self) -> u32 {
        self.dist
    }

    /// Range table.
    pub fn ranges(&self) -> &[Range] {
        &self.ranges
    }

    /// Hammering table.
    pub fn hammers(&self) -> &[Hammering] {
        &self.hammers
    }

    /// Flip record table.
    pub fn flip_records(&self) -> &[FlipRecord] {
        &self.flips
    }

    /// Flip records of one hammering.
    pub fn hammering_flips(&self, h: &Hammering) -> &[FlipRecord] {
        let start = h.flip_idx as usize;
        &self.flips[start..start + h.num_flips as usize]
    }

    /// Reconstructs every attack, range by range.
    pub fn attacks(&self) -> impl Iterator<Item = Attack> + '_ {
        self.ranges.iter().flat_map(move |r| {
            let hammers = &self.hammers[r.ham_idx as usize..(r.ham_idx + r.num_hammers) as usize];
            hammers.iter().enumerate().map(move |(i, h)| {
                let first = r.start.add_row(i as i32);
                let targets = Targets::pair(first, first.add_row(self.dist as i32));
                Attack::new(
                    targets,
                    self.hammering_flips(h).iter().flat_map(FlipRecord::flips),
                )
            })
        })
    }

    /// Converts back into a [`FlipTable`].
    pub fn to_fliptable(&self) -> FlipTable {
        FlipTable::new(self.attacks())
    }
}

impl LegacyTable {
    fn header(&self) -> Header {
        Header::layout(
            self.dist,
            self.ranges.len() as u32,
            self.hammers.len() as u32,
            self.flips.len() as u32,
        )
    }

    /// Total encoded size in bytes.
    pub fn encoded_size(&self) -> u64 {
        self.header().size
    }

    /// Encodes the section records, without the header.
    fn encode_sections(&self) -> [Vec<u8>; 3] {
        let mut ranges = Vec::with_capacity(self.ranges.len() * RANGE_SIZE as usize);
        for r in &self.ranges {
            put_addr(&mut ranges, &r.start);
            ranges.extend_from_slice(&r.num_hammers.to_le_bytes());
            ranges.extend_from_slice(&r.ham_idx.to_le_bytes());
        }
        let mut hammers = Vec::with_capacity(self.hammers.len() * HAMMERING_SIZE as usize);
        for h in &self.hammers {
            hammers.extend_from_slice(&h.num_flips.to_le_bytes());
            hammers.extend_from_slice(&h.flip_idx.to_le_bytes());
        }
        let mut flips = Vec::with_capacity(self.flips.len() * FLIP_RECORD_SIZE as usize);
        for f in &self.flips {
            put_addr(&mut flips, &f.location);
            flips.extend_from_slice(&f.cell_byte.to_le_bytes());
            flips.extend_from_slice(&[f.pullup, f.pulldown]);
        }
        [ranges, hammers, flips]
    }

    /// Writes the header and every section at its offset.
    ///
    /// The destination must already span [`LegacyTable::encoded_size`] bytes
    /// or grow on write; gaps between sections are not written.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if seeking or writing fails.
    pub fn write_to<W: Write + Seek>(&self, w: &mut W) -> Result<()> {
        let header = self.header();
        w.seek(SeekFrom::Start(0))?;
        w.write_all(&header.encode())?;
        let offsets = [header.range_off, header.hammer_off, header.flip_off];
        for (off, section) in offsets.into_iter().zip(self.encode_sections()) {
            w.seek(SeekFrom::Start(off))?;
            w.write_all(&section)?;
        }
        Ok(())
    }

    /// Encodes the whole file into memory.
    pub fn to_bytes(&self) -> Vec<u8> {
        let header = self.header();
        let mut buf = header.encode();
        let offsets = [header.range_off, header.hammer_off, header.flip_off];
        for (off, section) in offsets.into_iter().zip(self.encode_sections()) {
            buf.resize(off as usize, 0);
            buf.extend_from_slice(&section);
        }
        buf.resize(header.size as usize, 0);
        buf
    }

    /// Writes a binary fliptable file.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be created or written.
    pub fn write(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = File::create(path.as_ref())?;
        file.set_len(self.encoded_size())?;
        let mut writer = BufWriter::new(file);
        self.write_to(&mut writer)?;
        writer.flush()?;
        info!(
            "Wrote {}: {} ranges, {} hammerings, {} flips",
            path.as_ref().display(),
            self.ranges.len(),
            self.hammers.len(),
            self.flips.len()
        );
        Ok(())
    }

    /// Decodes a binary fliptable from memory.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Format`] on a bad magic number, a size mismatch,
    /// misaligned or overlong sections, or indices pointing outside their tables.
    pub fn from_bytes(buf: &[u8]) -> Result<Self> {
        let header = Header::decode(buf)?;

        let mut r = LeReader::at(buf, header.range_off);
        let ranges: Vec<Range> = (0..header.num_ranges)
            .map(|_| Range {
                start: r.addr(),
                num_hammers: r.u32(),
                ham_idx: r.u32(),
            })
            .collect();
        let mut r = LeReader::at(buf, header.hammer_off);
        let hammers: Vec<Hammering> = (0..header.num_hammers)
            .map(|_| Hammering {
                num_flips: r.u32(),
                flip_idx: r.u32(),
            })
            .collect();
        let mut r = LeReader::at(buf, header.flip_off);
        let flips: Vec<FlipRecord> = (0..header.num_flips)
            .map(|_| FlipRecord {
                location: r.addr(),
                cell_byte: r.u16(),
                pullup: r.u8(),
                pulldown: r.u8(),
            })
            .collect();

        for (i, range) in ranges.iter().enumerate() {
            if range.ham_idx as u64 + range.num_hammers as u64 > header.num_hammers as u64 {
                return Err(Error::Format(format!("range {} points past hammering table", i)));
            }
        }
        for (i, h) in hammers.iter().enumerate() {
            if h.flip_idx as u64 + h.num_flips as u64 > header.num_flips as u64 {
                return Err(Error::Format(format!("hammering {} points past flip table", i)));
            }
        }
        Ok(LegacyTable {
            dist: header.dist,
            ranges,
            hammers,
            flips,
        })
    }

    /// Reads a binary fliptable file.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be read, or see [`LegacyTable::from_bytes`].
    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let buf = std::fs::read(path.as_ref())?;
        LegacyTable::from_bytes(&buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fliptable::FlipDirection;

    fn row(row: u16) -> DRAMAddr {
        DRAMAddr::new(0, 0, 1, 2, row, 0)
    }

    fn up(row_: u16, bit: u32) -> Flip {
        Flip::new(row(row_), bit, FlipDirection::ZeroToOne)
    }

    fn down(row_: u16, bit: u32) -> Flip {
        Flip::new(row(row_), bit, FlipDirection::OneToZero)
    }

    fn pair(r: u16) -> Targets {
        Targets::pair(row(r), row(r + 2))
    }

    /// One range of two hammerings with three flip records.
    fn one_range() -> FlipTable {
        FlipTable::new([
            Attack::new(pair(10), [up(11, 0), down(11, 9)]),
            Attack::new(pair(11), [down(12, 63)]),
        ])
    }

    #[test]
    fn header_counts_and_alignment() {
        let legacy = LegacyTable::from_fliptable(&one_range(), None).unwrap();
        let bytes = legacy.to_bytes();
        let header = Header::decode(&bytes).unwrap();
        assert_eq!(
            (header.num_ranges, header.num_hammers, header.num_flips),
            (1, 2, 3)
        );
        assert_eq!(header.dist, 2);
        for off in [header.range_off, header.hammer_off, header.flip_off] {
            assert_eq!(off % 128, 0);
        }
        assert_eq!(header.range_off, 128);
        assert_eq!(header.hammer_off, 256);
        assert_eq!(header.flip_off, 384);
        assert_eq!(bytes.len() as u64, 384 + 3 * FLIP_RECORD_SIZE);
        assert_eq!(&bytes[0..4], &[0xb1, 0x7a, 0x1b, 0xf1]);
    }

    #[test]
    fn binary_round_trip() {
        let table = FlipTable::new([
            Attack::new(pair(10), [up(11, 0), down(11, 9), up(11, 9)]),
            Attack::empty(pair(11)),
            Attack::new(pair(40), [down(41, 7)]),
            Attack::new(
                Targets::pair(DRAMAddr::new(0, 0, 1, 3, 11, 0), DRAMAddr::new(0, 0, 1, 3, 13, 0)),
                [up(12, 1)],
            ),
        ]);
        let legacy = LegacyTable::from_fliptable(&table, None).unwrap();
        assert_eq!(legacy.ranges().len(), 3);
        let back = LegacyTable::from_bytes(&legacy.to_bytes()).unwrap();
        assert_eq!(back, legacy);
        assert_eq!(back.to_fliptable(), table);
    }

    #[test]
    fn single_sided_round_trip() {
        let table = FlipTable::new([
            Attack::new(Targets::single(row(5)), [up(6, 3)]),
            Attack::new(Targets::single(row(6)), [down(7, 4)]),
        ]);
        let legacy = LegacyTable::from_fliptable(&table, None).unwrap();
        assert_eq!(legacy.dist(), 0);
        assert_eq!(legacy.ranges().len(), 1);
        assert_eq!(legacy.to_fliptable(), table);
    }

    #[test]
    fn empty_table() {
        let legacy = LegacyTable::from_fliptable(&FlipTable::default(), None).unwrap();
        let bytes = legacy.to_bytes();
        assert_eq!(bytes.len(), 128);
        assert!(LegacyTable::from_bytes(&bytes).unwrap().to_fliptable().is_empty());
    }

    #[test]
    fn inconsistent_distance() {
        let table = FlipTable::new([Attack::empty(pair(10)), Attack::empty(Targets::single(row(20)))]);
        assert!(matches!(
            LegacyTable::from_fliptable(&table, None),
            Err(Error::InconsistentTargets(_))
        ));
        assert!(matches!(
            LegacyTable::from_fliptable(&one_range(), Some(3)),
            Err(Error::InconsistentTargets(_))
        ));
        let backwards = FlipTable::new([Attack::empty(Targets::pair(row(12), row(10)))]);
        assert!(matches!(
            LegacyTable::from_fliptable(&backwards, None),
            Err(Error::InconsistentTargets(_))
        ));
    }

    #[test]
    fn format_errors() {
        let bytes = LegacyTable::from_fliptable(&one_range(), None)
            .unwrap()
            .to_bytes();

        let mut bad_magic = bytes.clone();
        bad_magic[0] ^= 0xff;
        assert!(matches!(LegacyTable::from_bytes(&bad_magic), Err(Error::Format(_))));

        assert!(matches!(
            LegacyTable::from_bytes(&bytes[..bytes.len() - 1]),
            Err(Error::Format(_))
        ));
        assert!(matches!(LegacyTable::from_bytes(&bytes[..10]), Err(Error::Format(_))));

        let mut misaligned = bytes.clone();
        misaligned[16..24].copy_from_slice(&100u64.to_le_bytes());
        assert!(matches!(LegacyTable::from_bytes(&misaligned), Err(Error::Format(_))));

        let mut past_end = bytes.clone();
        past_end[44..48].copy_from_slice(&1000u32.to_le_bytes());
        assert!(matches!(LegacyTable::from_bytes(&past_end), Err(Error::Format(_))));

        let mut wrapped = LegacyTable::default().to_bytes();
        wrapped[32..40].copy_from_slice(&0xffff_ffff_ffff_ff80u64.to_le_bytes());
        wrapped[48..52].copy_from_slice(&11u32.to_le_bytes());
        assert!(matches!(LegacyTable::from_bytes(&wrapped), Err(Error::Format(_))));

        let mut bad_index = bytes;
        let flip_idx_of_second_hammering = 256 + 8 + 4;
        bad_index[flip_idx_of_second_hammering..flip_idx_of_second_hammering + 4]
            .copy_from_slice(&3u32.to_le_bytes());
        assert!(matches!(LegacyTable::from_bytes(&bad_index), Err(Error::Format(_))));
    }

    #[test]
    fn in_memory_and_file_encodings_agree() -> anyhow::Result<()> {
        let legacy = LegacyTable::from_fliptable(&one_range(), None)?;
        let mut cursor = std::io::Cursor::new(vec![0u8; legacy.encoded_size() as usize]);
        legacy.write_to(&mut cursor)?;
        assert_eq!(cursor.into_inner(), legacy.to_bytes());
        Ok(())
    }

    #[test]
    fn write_and_read_file() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("table.ftbl");
        let legacy = LegacyTable::from_fliptable(&FlipTable::default(), Some(2))?;
        legacy.write(&path)?;
        assert_eq!(std::fs::metadata(&path)?.len(), legacy.encoded_size());
        assert_eq!(LegacyTable::read(&path)?, legacy);
        Ok(())
    }
}
