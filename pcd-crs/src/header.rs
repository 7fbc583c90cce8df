//! Raw access to the LAS public header block and its (extended) variable
//! length records.
//!
//! Only the fields needed to locate and replace georeferencing records are
//! interpreted; every other header byte is carried through untouched.

use std::io::{Read, Seek, SeekFrom, Write};

use byteorder::{LittleEndian, ReadBytesExt as _, WriteBytesExt as _};

use crate::error::CrsError;

pub const LASF_PROJECTION: &str = "LASF_Projection";
pub const GEO_KEY_DIRECTORY_RECORD: u16 = 34735;
pub const GEO_DOUBLE_PARAMS_RECORD: u16 = 34736;
pub const GEO_ASCII_PARAMS_RECORD: u16 = 34737;
pub const OGC_WKT_RECORD: u16 = 2112;

/// Global encoding bit marking the CRS as stored in WKT form (LAS 1.4).
pub const WKT_GLOBAL_ENCODING_BIT: u16 = 1 << 4;

const SIGNATURE: &[u8; 4] = b"LASF";
const MIN_HEADER_SIZE: u16 = 227;
const VLR_HEADER_SIZE: usize = 54;

// byte offsets inside the public header block
const GLOBAL_ENCODING_OFFSET: usize = 6;
const VERSION_OFFSET: usize = 24;
const HEADER_SIZE_OFFSET: usize = 94;
const POINT_DATA_OFFSET: usize = 96;
const NUMBER_OF_VLRS_OFFSET: usize = 100;
const WAVEFORM_START_OFFSET: usize = 227;
const FIRST_EVLR_OFFSET: usize = 235;
const NUMBER_OF_EVLRS_OFFSET: usize = 243;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableLengthRecord {
    pub user_id: String,
    pub record_id: u16,
    pub description: String,
    pub data: Vec<u8>,
}

impl VariableLengthRecord {
    pub fn new(record_id: u16, description: &str, data: Vec<u8>) -> Self {
        Self {
            user_id: LASF_PROJECTION.to_string(),
            record_id,
            description: description.to_string(),
            data,
        }
    }

    pub fn is_crs_record(&self) -> bool {
        self.user_id == LASF_PROJECTION
            && matches!(
                self.record_id,
                GEO_KEY_DIRECTORY_RECORD
                    | GEO_DOUBLE_PARAMS_RECORD
                    | GEO_ASCII_PARAMS_RECORD
                    | OGC_WKT_RECORD
            )
    }

    pub fn encoded_len(&self) -> usize {
        VLR_HEADER_SIZE + self.data.len()
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<(), CrsError> {
        let length = u16::try_from(self.data.len()).map_err(|_| CrsError::RecordTooLarge {
            record_id: self.record_id,
            len: self.data.len(),
        })?;
        writer.write_u16::<LittleEndian>(0)?;
        writer.write_all(&fixed_field::<16>(&self.user_id))?;
        writer.write_u16::<LittleEndian>(self.record_id)?;
        writer.write_u16::<LittleEndian>(length)?;
        writer.write_all(&fixed_field::<32>(&self.description))?;
        writer.write_all(&self.data)?;
        Ok(())
    }

    /// Writes the record with the 60 byte extended header used after the
    /// point data of LAS 1.4 files.
    pub fn write_extended_to<W: Write>(&self, writer: &mut W) -> Result<(), CrsError> {
        writer.write_u16::<LittleEndian>(0)?;
        writer.write_all(&fixed_field::<16>(&self.user_id))?;
        writer.write_u16::<LittleEndian>(self.record_id)?;
        writer.write_u64::<LittleEndian>(self.data.len() as u64)?;
        writer.write_all(&fixed_field::<32>(&self.description))?;
        writer.write_all(&self.data)?;
        Ok(())
    }

    /// Payload as text, without the NUL terminator LAS writers append.
    pub fn text(&self) -> String {
        let end = self
            .data
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(self.data.len());
        String::from_utf8_lossy(&self.data[..end]).into_owned()
    }
}

fn fixed_field<const N: usize>(value: &str) -> [u8; N] {
    let mut field = [0u8; N];
    let bytes = value.as_bytes();
    let len = bytes.len().min(N);
    field[..len].copy_from_slice(&bytes[..len]);
    field
}

fn field_text(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

/// Public header block plus the VLRs that follow it.
#[derive(Debug, Clone)]
pub struct HeaderBlock {
    raw: Vec<u8>,
    pub vlrs: Vec<VariableLengthRecord>,
    /// Extended records from the end of a LAS 1.4 file.
    pub evlrs: Vec<VariableLengthRecord>,
    vlr_end: u64,
    evlr_start: Option<u64>,
}

impl HeaderBlock {
    pub fn read_from<R: Read + Seek>(reader: &mut R) -> Result<Self, CrsError> {
        let file_len = reader.seek(SeekFrom::End(0))?;
        reader.seek(SeekFrom::Start(0))?;

        let mut fixed = vec![0u8; MIN_HEADER_SIZE as usize];
        reader.read_exact(&mut fixed).map_err(|e| {
            CrsError::CorruptHeader(format!("public header block is truncated: {e}"))
        })?;
        if &fixed[..4] != SIGNATURE {
            return Err(CrsError::CorruptHeader(
                "file signature is not LASF".to_string(),
            ));
        }

        let header_size =
            u16::from_le_bytes([fixed[HEADER_SIZE_OFFSET], fixed[HEADER_SIZE_OFFSET + 1]]);
        if header_size < MIN_HEADER_SIZE {
            return Err(CrsError::CorruptHeader(format!(
                "header size {header_size} is below the LAS minimum of {MIN_HEADER_SIZE}"
            )));
        }
        let mut raw = fixed;
        raw.resize(header_size as usize, 0);
        reader
            .read_exact(&mut raw[MIN_HEADER_SIZE as usize..])
            .map_err(|e| CrsError::CorruptHeader(format!("header block is truncated: {e}")))?;

        let mut header = Self {
            raw,
            vlrs: Vec::new(),
            evlrs: Vec::new(),
            vlr_end: header_size as u64,
            evlr_start: None,
        };

        let point_data = header.offset_to_point_data() as u64;
        for index in 0..header.number_of_vlrs() {
            let vlr = read_vlr(reader).map_err(|e| {
                CrsError::CorruptHeader(format!("VLR {index} cannot be read: {e}"))
            })?;
            header.vlr_end += vlr.encoded_len() as u64;
            header.vlrs.push(vlr);
        }
        if header.vlr_end > point_data {
            return Err(CrsError::CorruptHeader(format!(
                "VLRs end at byte {} past the point data offset {point_data}",
                header.vlr_end
            )));
        }

        if let Some((start, count)) = header.evlr_location() {
            if start > 0 && count > 0 {
                if start < header.vlr_end || start > file_len {
                    return Err(CrsError::CorruptHeader(format!(
                        "EVLR offset {start} lies outside {}..{file_len}",
                        header.vlr_end
                    )));
                }
                header.evlr_start = Some(start);
                reader.seek(SeekFrom::Start(start))?;
                for index in 0..count {
                    let evlr = read_evlr(reader, file_len).map_err(|e| {
                        CrsError::CorruptHeader(format!("EVLR {index} cannot be read: {e}"))
                    })?;
                    header.evlrs.push(evlr);
                }
            }
        }

        Ok(header)
    }

    pub fn version(&self) -> (u8, u8) {
        (self.raw[VERSION_OFFSET], self.raw[VERSION_OFFSET + 1])
    }

    pub fn global_encoding(&self) -> u16 {
        self.u16_at(GLOBAL_ENCODING_OFFSET)
    }

    pub fn is_wkt_mode(&self) -> bool {
        self.global_encoding() & WKT_GLOBAL_ENCODING_BIT != 0
    }

    pub fn header_size(&self) -> u16 {
        self.u16_at(HEADER_SIZE_OFFSET)
    }

    pub fn offset_to_point_data(&self) -> u32 {
        self.u32_at(POINT_DATA_OFFSET)
    }

    pub fn number_of_vlrs(&self) -> u32 {
        self.u32_at(NUMBER_OF_VLRS_OFFSET)
    }

    /// Byte offset right after the last VLR in the source file.
    pub fn vlr_end(&self) -> u64 {
        self.vlr_end
    }

    /// Byte offset of the EVLR block in the source file, when it has one.
    pub fn evlr_start(&self) -> Option<u64> {
        self.evlr_start
    }

    /// Georeferencing records, VLRs before EVLRs.
    pub fn crs_records(&self) -> impl Iterator<Item = &VariableLengthRecord> {
        self.vlrs
            .iter()
            .chain(self.evlrs.iter())
            .filter(|r| r.is_crs_record())
    }

    pub fn find_record(&self, record_id: u16) -> Option<&VariableLengthRecord> {
        self.crs_records().find(|r| r.record_id == record_id)
    }

    /// Drops every georeferencing VLR and EVLR and appends `records` as
    /// VLRs, patching the counters and offsets that depend on the VLR block
    /// size.
    pub fn replace_crs_records(&mut self, records: Vec<VariableLengthRecord>) -> Result<(), CrsError> {
        let before: usize = self.vlrs.iter().map(|v| v.encoded_len()).sum();
        self.vlrs.retain(|v| !v.is_crs_record());
        self.evlrs.retain(|v| !v.is_crs_record());
        self.vlrs.extend(records);
        let after: usize = self.vlrs.iter().map(|v| v.encoded_len()).sum();
        let delta = after as i64 - before as i64;

        let point_data = i64::from(self.offset_to_point_data()) + delta;
        let point_data = u32::try_from(point_data).map_err(|_| {
            CrsError::CorruptHeader(format!(
                "point data offset {point_data} is out of range after rewriting records"
            ))
        })?;
        self.put_u32(POINT_DATA_OFFSET, point_data);
        self.put_u32(NUMBER_OF_VLRS_OFFSET, self.vlrs.len() as u32);

        let (_, minor) = self.version();
        if minor >= 3 && self.raw.len() >= WAVEFORM_START_OFFSET + 8 {
            self.shift_u64(WAVEFORM_START_OFFSET, delta);
        }
        if minor >= 4 && self.raw.len() >= NUMBER_OF_EVLRS_OFFSET + 4 {
            self.shift_u64(FIRST_EVLR_OFFSET, delta);
            self.put_u32(NUMBER_OF_EVLRS_OFFSET, self.evlrs.len() as u32);
        }
        Ok(())
    }

    /// Writes the header block and its VLRs. The caller appends the point
    /// data of the source file, from `vlr_end()` up to `evlr_start()`, then
    /// calls [`HeaderBlock::write_evlrs_to`].
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<(), CrsError> {
        writer.write_all(&self.raw)?;
        for vlr in &self.vlrs {
            vlr.write_to(writer)?;
        }
        Ok(())
    }

    pub fn write_evlrs_to<W: Write>(&self, writer: &mut W) -> Result<(), CrsError> {
        for evlr in &self.evlrs {
            evlr.write_extended_to(writer)?;
        }
        Ok(())
    }

    fn evlr_location(&self) -> Option<(u64, u32)> {
        let (major, minor) = self.version();
        if (major, minor) < (1, 4) || self.raw.len() < NUMBER_OF_EVLRS_OFFSET + 4 {
            return None;
        }
        Some((
            self.u64_at(FIRST_EVLR_OFFSET),
            self.u32_at(NUMBER_OF_EVLRS_OFFSET),
        ))
    }

    // a non-zero start is an absolute file offset behind the VLRs and moves with them
    fn shift_u64(&mut self, offset: usize, delta: i64) {
        let value = self.u64_at(offset);
        if value != 0 {
            self.put_u64(offset, (value as i64 + delta) as u64);
        }
    }

    fn u16_at(&self, offset: usize) -> u16 {
        u16::from_le_bytes([self.raw[offset], self.raw[offset + 1]])
    }

    fn u32_at(&self, offset: usize) -> u32 {
        let mut bytes = [0u8; 4];
        bytes.copy_from_slice(&self.raw[offset..offset + 4]);
        u32::from_le_bytes(bytes)
    }

    fn u64_at(&self, offset: usize) -> u64 {
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&self.raw[offset..offset + 8]);
        u64::from_le_bytes(bytes)
    }

    fn put_u32(&mut self, offset: usize, value: u32) {
        self.raw[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
    }

    fn put_u64(&mut self, offset: usize, value: u64) {
        self.raw[offset..offset + 8].copy_from_slice(&value.to_le_bytes());
    }
}

fn read_vlr<R: Read>(reader: &mut R) -> std::io::Result<VariableLengthRecord> {
    let _reserved = reader.read_u16::<LittleEndian>()?;
    let mut user_id = [0u8; 16];
    reader.read_exact(&mut user_id)?;
    let record_id = reader.read_u16::<LittleEndian>()?;
    let length = reader.read_u16::<LittleEndian>()?;
    let mut description = [0u8; 32];
    reader.read_exact(&mut description)?;
    let mut data = vec![0u8; length as usize];
    reader.read_exact(&mut data)?;

    Ok(VariableLengthRecord {
        user_id: field_text(&user_id),
        record_id,
        description: field_text(&description),
        data,
    })
}

fn read_evlr<R: Read + Seek>(reader: &mut R, file_len: u64) -> std::io::Result<VariableLengthRecord> {
    let _reserved = reader.read_u16::<LittleEndian>()?;
    let mut user_id = [0u8; 16];
    reader.read_exact(&mut user_id)?;
    let record_id = reader.read_u16::<LittleEndian>()?;
    let length = reader.read_u64::<LittleEndian>()?;
    let mut description = [0u8; 32];
    reader.read_exact(&mut description)?;

    let position = reader.stream_position()?;
    if position.checked_add(length).filter(|end| *end <= file_len).is_none() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            format!("record of {length} bytes overruns the file"),
        ));
    }
    let mut data = vec![0u8; length as usize];
    reader.read_exact(&mut data)?;

    Ok(VariableLengthRecord {
        user_id: field_text(&user_id),
        record_id,
        description: field_text(&description),
        data,
    })
}
