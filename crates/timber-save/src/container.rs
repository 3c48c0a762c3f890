//! ZIP framing of `.timber` save containers.
//!
//! The archive is split into raw records instead of being unpacked:
//! every entry keeps its local record (header, data, descriptor and any
//! slack up to the next record) and its central directory record as the
//! exact bytes read from disk. Re-assembly only rewrites the offset fields
//! that depend on layout, so an untouched archive serializes back to the
//! same bytes and untouched entries survive an edit verbatim.

use timber_common::{TimberError, TimberResult};

use crate::compression::{CompressionLevel, EntryCompression};

const LOCAL_SIGNATURE: u32 = 0x0403_4b50;
const CENTRAL_SIGNATURE: u32 = 0x0201_4b50;
const END_SIGNATURE: u32 = 0x0605_4b50;

const LOCAL_FIXED_LEN: usize = 30;
const CENTRAL_FIXED_LEN: usize = 46;
const END_FIXED_LEN: usize = 22;
const MAX_COMMENT_LEN: usize = u16::MAX as usize;

const FLAG_ENCRYPTED: u16 = 1;
const FLAG_DATA_DESCRIPTOR: u16 = 1 << 3;

// Central directory record field offsets
const CD_FLAGS: usize = 8;
const CD_METHOD: usize = 10;
const CD_CRC: usize = 16;
const CD_COMPRESSED: usize = 20;
const CD_UNCOMPRESSED: usize = 24;
const CD_NAME_LEN: usize = 28;
const CD_EXTRA_LEN: usize = 30;
const CD_COMMENT_LEN: usize = 32;
const CD_LOCAL_OFFSET: usize = 42;

// Local header field offsets
const LH_FLAGS: usize = 6;
const LH_METHOD: usize = 8;
const LH_CRC: usize = 14;
const LH_COMPRESSED: usize = 18;
const LH_UNCOMPRESSED: usize = 22;
const LH_NAME_LEN: usize = 26;
const LH_EXTRA_LEN: usize = 28;

// End of central directory field offsets
const END_THIS_DISK: usize = 4;
const END_CD_DISK: usize = 6;
const END_DISK_ENTRIES: usize = 8;
const END_TOTAL_ENTRIES: usize = 10;
const END_CD_SIZE: usize = 12;
const END_CD_OFFSET: usize = 16;
const END_COMMENT_LEN: usize = 20;

fn read_u16(buf: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([buf[at], buf[at + 1]])
}

fn read_u32(buf: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]])
}

fn write_u16(buf: &mut [u8], at: usize, value: u16) {
    buf[at..at + 2].copy_from_slice(&value.to_le_bytes());
}

fn write_u32(buf: &mut [u8], at: usize, value: u32) {
    buf[at..at + 4].copy_from_slice(&value.to_le_bytes());
}

fn to_u32(value: usize, what: &str) -> TimberResult<u32> {
    u32::try_from(value)
        .map_err(|_| TimberError::Format(format!("{what} of {value} bytes needs ZIP64")))
}

/// One archive entry, kept as raw records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    name: String,
    central: Vec<u8>,
    local: Vec<u8>,
}

impl Entry {
    /// Entry name (section identifier).
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// General purpose flags.
    #[must_use]
    pub fn flags(&self) -> u16 {
        read_u16(&self.central, CD_FLAGS)
    }

    /// Whether the entry is encrypted.
    #[must_use]
    pub fn is_encrypted(&self) -> bool {
        self.flags() & FLAG_ENCRYPTED != 0
    }

    /// Raw compression method.
    #[must_use]
    pub fn method(&self) -> u16 {
        read_u16(&self.central, CD_METHOD)
    }

    /// CRC-32 of the uncompressed payload.
    #[must_use]
    pub fn crc32(&self) -> u32 {
        read_u32(&self.central, CD_CRC)
    }

    /// Size of the stored payload.
    #[must_use]
    pub fn compressed_size(&self) -> usize {
        read_u32(&self.central, CD_COMPRESSED) as usize
    }

    /// Size of the payload once inflated.
    #[must_use]
    pub fn uncompressed_size(&self) -> usize {
        read_u32(&self.central, CD_UNCOMPRESSED) as usize
    }

    fn data_start(&self) -> usize {
        LOCAL_FIXED_LEN
            + read_u16(&self.local, LH_NAME_LEN) as usize
            + read_u16(&self.local, LH_EXTRA_LEN) as usize
    }

    /// Stored (possibly compressed) payload bytes.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        let start = self.data_start();
        &self.local[start..start + self.compressed_size()]
    }

    /// Total size of this entry's local record.
    #[must_use]
    pub fn record_len(&self) -> usize {
        self.local.len()
    }

    /// Replaces the payload, compressing it with `compression`.
    ///
    /// The local record is rebuilt with sizes in the header (no data
    /// descriptor); name, extra field, timestamps and attributes are kept.
    pub fn replace_payload(
        &mut self,
        payload: &[u8],
        compression: EntryCompression,
        level: CompressionLevel,
    ) -> TimberResult<()> {
        let compressed = compression.compress(payload, level)?;
        let crc = crc32fast::hash(payload);
        let compressed_len = to_u32(compressed.len(), "compressed entry")?;
        let payload_len = to_u32(payload.len(), "entry")?;

        let header_len = self.data_start();
        let mut local = Vec::with_capacity(header_len + compressed.len());
        local.extend_from_slice(&self.local[..header_len]);
        let flags = read_u16(&local, LH_FLAGS) & !FLAG_DATA_DESCRIPTOR;
        write_u16(&mut local, LH_FLAGS, flags);
        write_u16(&mut local, LH_METHOD, compression.method());
        write_u32(&mut local, LH_CRC, crc);
        write_u32(&mut local, LH_COMPRESSED, compressed_len);
        write_u32(&mut local, LH_UNCOMPRESSED, payload_len);
        local.extend_from_slice(&compressed);

        let flags = read_u16(&self.central, CD_FLAGS) & !FLAG_DATA_DESCRIPTOR;
        write_u16(&mut self.central, CD_FLAGS, flags);
        write_u16(&mut self.central, CD_METHOD, compression.method());
        write_u32(&mut self.central, CD_CRC, crc);
        write_u32(&mut self.central, CD_COMPRESSED, compressed_len);
        write_u32(&mut self.central, CD_UNCOMPRESSED, payload_len);

        self.local = local;
        Ok(())
    }
}

/// A parsed ZIP archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Archive {
    /// Bytes before the first local record.
    preamble: Vec<u8>,
    /// Entries in central directory order.
    entries: Vec<Entry>,
    /// Indices into `entries` in on-disk local record order.
    local_order: Vec<usize>,
    /// Bytes from the end of the central directory to the end of the file.
    trailer: Vec<u8>,
    /// Offset of the end record inside `trailer`.
    end_at: usize,
}

impl Default for Archive {
    fn default() -> Self {
        let mut trailer = vec![0u8; END_FIXED_LEN];
        write_u32(&mut trailer, 0, END_SIGNATURE);
        Self {
            preamble: Vec::new(),
            entries: Vec::new(),
            local_order: Vec::new(),
            trailer,
            end_at: 0,
        }
    }
}

impl Archive {
    /// Parses archive bytes into raw records.
    pub fn parse(bytes: &[u8]) -> TimberResult<Self> {
        let end_pos = find_end_record(bytes)?;
        let end = &bytes[end_pos..];

        if read_u16(end, END_THIS_DISK) != 0 || read_u16(end, END_CD_DISK) != 0 {
            return Err(TimberError::Format(
                "multi-disk archives are not supported".to_string(),
            ));
        }
        let total = read_u16(end, END_TOTAL_ENTRIES);
        let cd_size = read_u32(end, END_CD_SIZE);
        let cd_offset = read_u32(end, END_CD_OFFSET);
        if total == u16::MAX || cd_size == u32::MAX || cd_offset == u32::MAX {
            return Err(TimberError::Format(
                "ZIP64 archives are not supported".to_string(),
            ));
        }
        if read_u16(end, END_DISK_ENTRIES) != total {
            return Err(TimberError::Format(
                "entry counts in end record disagree".to_string(),
            ));
        }

        let cd_start = cd_offset as usize;
        let cd_end = cd_start + cd_size as usize;
        if cd_end > end_pos {
            return Err(TimberError::Format(format!(
                "central directory ({cd_start}..{cd_end}) overlaps end record at {end_pos}"
            )));
        }

        let mut centrals = Vec::with_capacity(total as usize);
        let mut pos = cd_start;
        for index in 0..total {
            if pos + CENTRAL_FIXED_LEN > cd_end || read_u32(bytes, pos) != CENTRAL_SIGNATURE {
                return Err(TimberError::Format(format!(
                    "central directory record {index} is malformed"
                )));
            }
            let len = CENTRAL_FIXED_LEN
                + read_u16(bytes, pos + CD_NAME_LEN) as usize
                + read_u16(bytes, pos + CD_EXTRA_LEN) as usize
                + read_u16(bytes, pos + CD_COMMENT_LEN) as usize;
            if pos + len > cd_end {
                return Err(TimberError::Format(format!(
                    "central directory record {index} runs past the directory"
                )));
            }
            centrals.push(&bytes[pos..pos + len]);
            pos += len;
        }
        if pos != cd_end {
            return Err(TimberError::Format(format!(
                "central directory has {} unaccounted bytes",
                cd_end - pos
            )));
        }

        let mut local_order: Vec<usize> = (0..centrals.len()).collect();
        local_order.sort_by_key(|&i| read_u32(centrals[i], CD_LOCAL_OFFSET));

        let mut locals: Vec<&[u8]> = vec![&[][..]; centrals.len()];
        for (rank, &index) in local_order.iter().enumerate() {
            let start = read_u32(centrals[index], CD_LOCAL_OFFSET) as usize;
            let stop = local_order
                .get(rank + 1)
                .map_or(cd_start, |&next| {
                    read_u32(centrals[next], CD_LOCAL_OFFSET) as usize
                });
            if start >= stop || stop > cd_start {
                return Err(TimberError::Format(format!(
                    "local record of entry {index} overlaps its neighbour"
                )));
            }
            let record = &bytes[start..stop];
            if record.len() < LOCAL_FIXED_LEN || read_u32(record, 0) != LOCAL_SIGNATURE {
                return Err(TimberError::Format(format!(
                    "entry {index} has no local header at offset {start}"
                )));
            }
            let data_end = LOCAL_FIXED_LEN
                + read_u16(record, LH_NAME_LEN) as usize
                + read_u16(record, LH_EXTRA_LEN) as usize
                + read_u32(centrals[index], CD_COMPRESSED) as usize;
            if data_end > record.len() {
                return Err(TimberError::Format(format!(
                    "entry {index} data is truncated"
                )));
            }
            locals[index] = record;
        }

        let entries = centrals
            .iter()
            .zip(locals)
            .map(|(central, local)| {
                let name_len = read_u16(central, CD_NAME_LEN) as usize;
                let name_bytes = &central[CENTRAL_FIXED_LEN..CENTRAL_FIXED_LEN + name_len];
                Entry {
                    name: String::from_utf8_lossy(name_bytes).into_owned(),
                    central: central.to_vec(),
                    local: local.to_vec(),
                }
            })
            .collect();

        let first_local = local_order
            .first()
            .map_or(cd_start, |&i| read_u32(centrals[i], CD_LOCAL_OFFSET) as usize);

        Ok(Self {
            preamble: bytes[..first_local].to_vec(),
            entries,
            local_order,
            trailer: bytes[cd_end..].to_vec(),
            end_at: end_pos - cd_end,
        })
    }

    /// Entries in central directory order.
    #[must_use]
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// Index of the entry with the given name.
    #[must_use]
    pub fn position(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.name == name)
    }

    /// Looks up an entry by name.
    #[must_use]
    pub fn entry(&self, name: &str) -> Option<&Entry> {
        self.position(name).map(|i| &self.entries[i])
    }

    /// Mutable access to an entry by index.
    pub fn entry_mut(&mut self, index: usize) -> Option<&mut Entry> {
        self.entries.get_mut(index)
    }

    /// Archive comment.
    #[must_use]
    pub fn comment(&self) -> &[u8] {
        &self.trailer[self.end_at + END_FIXED_LEN..]
    }

    /// Appends a new entry at the end of the archive.
    pub fn push_entry(
        &mut self,
        name: &str,
        payload: &[u8],
        compression: EntryCompression,
        level: CompressionLevel,
    ) -> TimberResult<()> {
        let name_len = u16::try_from(name.len())
            .map_err(|_| TimberError::Format(format!("entry name '{name}' is too long")))?;
        if self.entries.len() >= usize::from(u16::MAX - 1) {
            return Err(TimberError::Format("too many entries".to_string()));
        }

        // Version 2.0, 1980-01-01 00:00 timestamp
        let mut local = vec![0u8; LOCAL_FIXED_LEN];
        write_u32(&mut local, 0, LOCAL_SIGNATURE);
        write_u16(&mut local, 4, 20);
        write_u16(&mut local, 12, 0x0021);
        write_u16(&mut local, LH_NAME_LEN, name_len);
        local.extend_from_slice(name.as_bytes());

        let mut central = vec![0u8; CENTRAL_FIXED_LEN];
        write_u32(&mut central, 0, CENTRAL_SIGNATURE);
        write_u16(&mut central, 4, 20);
        write_u16(&mut central, 6, 20);
        write_u16(&mut central, 14, 0x0021);
        write_u16(&mut central, CD_NAME_LEN, name_len);
        central.extend_from_slice(name.as_bytes());

        let mut entry = Entry {
            name: name.to_string(),
            central,
            local,
        };
        entry.replace_payload(payload, compression, level)?;

        self.local_order.push(self.entries.len());
        self.entries.push(entry);
        Ok(())
    }

    /// Serializes the archive.
    pub fn to_bytes(&self) -> TimberResult<Vec<u8>> {
        let local_total: usize = self.entries.iter().map(Entry::record_len).sum();
        let central_total: usize = self.entries.iter().map(|e| e.central.len()).sum();
        let mut out = Vec::with_capacity(
            self.preamble.len() + local_total + central_total + self.trailer.len(),
        );
        out.extend_from_slice(&self.preamble);

        let mut offsets = vec![0u32; self.entries.len()];
        for &index in &self.local_order {
            offsets[index] = to_u32(out.len(), "archive")?;
            out.extend_from_slice(&self.entries[index].local);
        }

        let cd_offset = to_u32(out.len(), "archive")?;
        for (entry, offset) in self.entries.iter().zip(&offsets) {
            let start = out.len();
            out.extend_from_slice(&entry.central);
            write_u32(&mut out[start..], CD_LOCAL_OFFSET, *offset);
        }
        let cd_size = to_u32(out.len() - cd_offset as usize, "central directory")?;
        let count = u16::try_from(self.entries.len())
            .map_err(|_| TimberError::Format("too many entries".to_string()))?;

        let start = out.len() + self.end_at;
        out.extend_from_slice(&self.trailer);
        let end = &mut out[start..];
        write_u16(end, END_DISK_ENTRIES, count);
        write_u16(end, END_TOTAL_ENTRIES, count);
        write_u32(end, END_CD_SIZE, cd_size);
        write_u32(end, END_CD_OFFSET, cd_offset);
        Ok(out)
    }
}

/// Locates the end of central directory record, scanning back over a
/// possible archive comment.
fn find_end_record(bytes: &[u8]) -> TimberResult<usize> {
    if bytes.len() < END_FIXED_LEN {
        return Err(TimberError::Format(format!(
            "{} bytes is too short for a ZIP archive",
            bytes.len()
        )));
    }
    let last = bytes.len() - END_FIXED_LEN;
    let first = last.saturating_sub(MAX_COMMENT_LEN);
    (first..=last)
        .rev()
        .find(|&pos| {
            read_u32(bytes, pos) == END_SIGNATURE
                && pos + END_FIXED_LEN + read_u16(bytes, pos + END_COMMENT_LEN) as usize
                    == bytes.len()
        })
        .ok_or_else(|| TimberError::Format("end of central directory not found".to_string()))
}
