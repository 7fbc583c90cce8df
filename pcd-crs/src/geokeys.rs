//! GeoTIFF key directory as stored in the `LASF_Projection`/34735 record.
//!
//! Layout, all `u16` little endian:
//! `[KeyDirectoryVersion, KeyRevision, MinorRevision, NumberOfKeys,
//!   KeyID1, TIFFTagLocation1, Count1, Value_Offset1, ...]`

use std::io::Cursor;

use byteorder::{LittleEndian, ReadBytesExt as _};

use crate::error::CrsError;
use crate::registry::CrsKind;

// GeoKey IDs
pub const GT_MODEL_TYPE_GEO_KEY: u16 = 1024;
pub const GT_RASTER_TYPE_GEO_KEY: u16 = 1025;
pub const GEOGRAPHIC_TYPE_GEO_KEY: u16 = 2048;
pub const PROJECTED_CS_TYPE_GEO_KEY: u16 = 3072;

// GeoKey values
pub const MODEL_TYPE_PROJECTED: u16 = 1;
pub const MODEL_TYPE_GEOGRAPHIC: u16 = 2;
pub const RASTER_PIXEL_IS_AREA: u16 = 1;
pub const USER_DEFINED: u16 = 32767;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeoKeyEntry {
    pub id: u16,
    pub location: u16,
    pub count: u16,
    pub value: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeoKeyDirectory {
    pub version: u16,
    pub revision: (u16, u16),
    pub keys: Vec<GeoKeyEntry>,
}

impl GeoKeyDirectory {
    pub fn for_epsg(code: u16, kind: CrsKind) -> Self {
        let (model, cs_key) = match kind {
            CrsKind::Projected => (MODEL_TYPE_PROJECTED, PROJECTED_CS_TYPE_GEO_KEY),
            CrsKind::Geographic => (MODEL_TYPE_GEOGRAPHIC, GEOGRAPHIC_TYPE_GEO_KEY),
        };
        let inline = |id, value| GeoKeyEntry {
            id,
            location: 0,
            count: 1,
            value,
        };
        Self {
            version: 1,
            revision: (1, 0),
            keys: vec![
                inline(GT_MODEL_TYPE_GEO_KEY, model),
                inline(GT_RASTER_TYPE_GEO_KEY, RASTER_PIXEL_IS_AREA),
                inline(cs_key, code),
            ],
        }
    }

    pub fn decode(data: &[u8]) -> Result<Self, CrsError> {
        if data.len() < 8 {
            return Err(CrsError::CorruptHeader(format!(
                "GeoKey directory of {} bytes is shorter than its header",
                data.len()
            )));
        }
        let mut cursor = Cursor::new(data);
        let version = cursor.read_u16::<LittleEndian>()?;
        let revision = cursor.read_u16::<LittleEndian>()?;
        let minor = cursor.read_u16::<LittleEndian>()?;
        let count = cursor.read_u16::<LittleEndian>()? as usize;

        if data.len() < 8 + count * 8 {
            return Err(CrsError::CorruptHeader(format!(
                "GeoKey directory declares {count} keys but holds {} bytes",
                data.len()
            )));
        }

        let mut keys = Vec::with_capacity(count);
        for _ in 0..count {
            keys.push(GeoKeyEntry {
                id: cursor.read_u16::<LittleEndian>()?,
                location: cursor.read_u16::<LittleEndian>()?,
                count: cursor.read_u16::<LittleEndian>()?,
                value: cursor.read_u16::<LittleEndian>()?,
            });
        }

        Ok(Self {
            version,
            revision: (revision, minor),
            keys,
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(8 + self.keys.len() * 8);
        let words = [
            self.version,
            self.revision.0,
            self.revision.1,
            self.keys.len() as u16,
        ];
        for word in words
            .into_iter()
            .chain(self.keys.iter().flat_map(|k| [k.id, k.location, k.count, k.value]))
        {
            buf.extend_from_slice(&word.to_le_bytes());
        }
        buf
    }

    fn inline_value(&self, id: u16) -> Option<u16> {
        self.keys
            .iter()
            .find(|k| k.id == id && k.location == 0)
            .map(|k| k.value)
    }

    /// The projected code if present, else the geographic one. Zero and the
    /// user-defined marker do not name an EPSG system.
    pub fn epsg(&self) -> Option<u16> {
        [PROJECTED_CS_TYPE_GEO_KEY, GEOGRAPHIC_TYPE_GEO_KEY]
            .into_iter()
            .filter_map(|id| self.inline_value(id))
            .find(|&code| code != 0 && code != USER_DEFINED)
    }
}
