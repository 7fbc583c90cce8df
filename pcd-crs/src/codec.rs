use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read as _, Seek, SeekFrom, Write as _};
use std::path::Path;

use pcd_core::crs::{EpsgCode, ReferenceSystem};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::error::CrsError;
use crate::geokeys::GeoKeyDirectory;
use crate::header::{
    HeaderBlock, VariableLengthRecord, GEO_KEY_DIRECTORY_RECORD, OGC_WKT_RECORD,
};
use crate::registry::{horizontal_component, kind_of, CrsRegistry};
use crate::wkt;

/// What a failed registry lookup turns into.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LookupMode {
    /// The descriptor degrades to `ReferenceSystem::Undefined`.
    #[default]
    Permissive,
    /// The lookup fails with `CrsError::InvalidReferenceSystem`.
    Strict,
}

/// Reads and writes the reference system stored in a LAS header.
#[derive(Debug, Clone, Default)]
pub struct CrsCodec {
    registry: CrsRegistry,
    mode: LookupMode,
}

impl CrsCodec {
    pub fn new(registry: CrsRegistry, mode: LookupMode) -> Self {
        Self { registry, mode }
    }

    pub fn permissive() -> Self {
        Self::new(CrsRegistry, LookupMode::Permissive)
    }

    pub fn strict() -> Self {
        Self::new(CrsRegistry, LookupMode::Strict)
    }

    pub fn registry(&self) -> &CrsRegistry {
        &self.registry
    }

    pub fn mode(&self) -> LookupMode {
        self.mode
    }

    pub fn get<P: AsRef<Path>>(&self, path: P) -> Result<ReferenceSystem, CrsError> {
        let mut reader = BufReader::new(File::open(path.as_ref())?);
        let header = HeaderBlock::read_from(&mut reader)?;
        self.decode_header(&header)
    }

    /// Decodes the record matching the header's storage mode, falling back to
    /// the other form when only that one is present.
    pub fn decode_header(&self, header: &HeaderBlock) -> Result<ReferenceSystem, CrsError> {
        let wkt_record = header.find_record(OGC_WKT_RECORD);
        let geokey_record = header.find_record(GEO_KEY_DIRECTORY_RECORD);

        let (first, second) = if header.is_wkt_mode() {
            (wkt_record, geokey_record)
        } else {
            (geokey_record, wkt_record)
        };
        match first.or(second) {
            Some(record) if record.record_id == OGC_WKT_RECORD => self.decode_wkt_record(record),
            Some(record) => self.decode_geokey_record(record),
            None => Ok(ReferenceSystem::Undefined),
        }
    }

    fn decode_wkt_record(&self, record: &VariableLengthRecord) -> Result<ReferenceSystem, CrsError> {
        let text = record.text();
        match wkt::parse(&text) {
            Ok(_) => Ok(ReferenceSystem::Wkt(text.trim().to_string())),
            Err(e) => self.unresolved(format!("WKT record cannot be parsed: {e}")),
        }
    }

    fn decode_geokey_record(
        &self,
        record: &VariableLengthRecord,
    ) -> Result<ReferenceSystem, CrsError> {
        let directory = GeoKeyDirectory::decode(&record.data)?;
        match directory.epsg() {
            Some(code) => self.resolve_epsg(code as EpsgCode),
            None => Ok(ReferenceSystem::Undefined),
        }
    }

    /// Writes `crs` in the tile's current storage mode and returns whether the
    /// header was rewritten. In permissive mode a descriptor that cannot be
    /// expressed in that mode leaves the file untouched and returns `false`.
    ///
    /// The file is replaced atomically; concurrent writers to the same tile
    /// are not coordinated.
    pub fn set<P: AsRef<Path>>(&self, path: P, crs: &ReferenceSystem) -> Result<bool, CrsError> {
        let path = path.as_ref();
        let mut source = BufReader::new(File::open(path)?);
        let mut header = HeaderBlock::read_from(&mut source)?;

        let Some(records) = self.encode_records(crs, header.is_wkt_mode())? else {
            return Ok(false);
        };
        let tail_start = header.vlr_end();
        let evlr_start = header.evlr_start();
        header.replace_crs_records(records)?;

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let temp = NamedTempFile::new_in(dir)?;
        {
            let mut writer = BufWriter::new(temp.as_file());
            header.write_to(&mut writer)?;
            source.seek(SeekFrom::Start(tail_start))?;
            match evlr_start {
                Some(end) => {
                    io::copy(&mut (&mut source).take(end - tail_start), &mut writer)?;
                    header.write_evlrs_to(&mut writer)?;
                }
                None => {
                    io::copy(&mut source, &mut writer)?;
                }
            }
            writer.flush()?;
        }
        drop(source);
        std::fs::set_permissions(temp.path(), std::fs::metadata(path)?.permissions())?;
        temp.persist(path).map_err(|e| CrsError::Io(e.error))?;

        log::debug!("wrote {crs} into {path:?}");
        Ok(true)
    }

    /// Georeferencing records for `crs`; `None` when permissive mode gives up.
    pub fn encode_records(
        &self,
        crs: &ReferenceSystem,
        wkt_mode: bool,
    ) -> Result<Option<Vec<VariableLengthRecord>>, CrsError> {
        if crs.is_undefined() {
            return Ok(Some(Vec::new()));
        }

        if wkt_mode {
            let Some(text) = self.writable_wkt(crs)? else {
                return Ok(None);
            };
            let mut data = text.into_bytes();
            data.push(0);
            return Ok(Some(vec![VariableLengthRecord::new(
                OGC_WKT_RECORD,
                "OGC Coordinate System WKT",
                data,
            )]));
        }

        let code = match self.epsg(crs)? {
            Some(code) => code,
            None => return self.give_up(format!("{crs} has no EPSG code")),
        };
        let (Some(definition), Ok(short)) = (self.registry.get(code), u16::try_from(code)) else {
            return self.give_up(format!("EPSG:{code} cannot be stored in a GeoKey directory"));
        };
        let directory = GeoKeyDirectory::for_epsg(short, definition.kind);
        Ok(Some(vec![VariableLengthRecord::new(
            GEO_KEY_DIRECTORY_RECORD,
            "GeoTiff GeoKeyDirectoryTag",
            directory.encode(),
        )]))
    }

    // PROJCS/GEOGCS text: user WKT with such a root is written as given, the
    // horizontal part of a compound system is extracted, anything else goes
    // through the registry.
    fn writable_wkt(&self, crs: &ReferenceSystem) -> Result<Option<String>, CrsError> {
        if let ReferenceSystem::Wkt(text) = crs {
            if let Ok(root) = wkt::parse(text) {
                if kind_of(&root).is_some() {
                    return Ok(Some(text.trim().to_string()));
                }
                if let Some(horizontal) = horizontal_component(&root) {
                    return Ok(Some(horizontal.to_string()));
                }
            }
        }
        match self.wkt(crs)? {
            Some(text) => Ok(Some(text)),
            None => self.give_up(format!("{crs} has no WKT definition")),
        }
    }

    /// EPSG code of a descriptor, when the registry knows it.
    pub fn epsg(&self, crs: &ReferenceSystem) -> Result<Option<EpsgCode>, CrsError> {
        let resolved = match crs {
            ReferenceSystem::Epsg(code) => self.resolve_epsg(*code)?,
            ReferenceSystem::Wkt(text) => self.wkt_to_epsg(text)?,
            ReferenceSystem::Undefined => return Ok(None),
        };
        Ok(resolved.as_epsg())
    }

    /// WKT text of a descriptor; EPSG codes are expanded from the registry.
    pub fn wkt(&self, crs: &ReferenceSystem) -> Result<Option<String>, CrsError> {
        let resolved = match crs {
            ReferenceSystem::Epsg(code) => self.epsg_to_wkt(*code)?,
            ReferenceSystem::Wkt(text) => match wkt::parse(text) {
                Ok(_) => ReferenceSystem::Wkt(text.clone()),
                Err(e) => self.unresolved(format!("WKT cannot be parsed: {e}"))?,
            },
            ReferenceSystem::Undefined => return Ok(None),
        };
        Ok(resolved.as_wkt().map(str::to_string))
    }

    pub fn epsg_to_wkt(&self, code: EpsgCode) -> Result<ReferenceSystem, CrsError> {
        match self.registry.get(code) {
            Some(def) => Ok(ReferenceSystem::Wkt(def.wkt.to_string())),
            None => self.unresolved(format!("EPSG:{code} is not in the registry")),
        }
    }

    pub fn wkt_to_epsg(&self, text: &str) -> Result<ReferenceSystem, CrsError> {
        let root = match wkt::parse(text) {
            Ok(root) => root,
            Err(e) => return self.unresolved(format!("WKT cannot be parsed: {e}")),
        };
        match self.registry.identify(&root) {
            Some(def) => Ok(ReferenceSystem::Epsg(def.epsg)),
            None => self.unresolved(format!(
                "WKT '{}' does not match a registered system",
                root.name().unwrap_or(&root.keyword)
            )),
        }
    }

    /// Whether two descriptors denote the same system: equal EPSG codes, or
    /// identical text when neither resolves to a code.
    pub fn same_reference_system(&self, a: &ReferenceSystem, b: &ReferenceSystem) -> bool {
        if a == b {
            return true;
        }
        match (self.registered_code(a), self.registered_code(b)) {
            (Some(x), Some(y)) => x == y,
            _ => false,
        }
    }

    // lookup without mode handling, for comparisons
    fn registered_code(&self, crs: &ReferenceSystem) -> Option<EpsgCode> {
        match crs {
            ReferenceSystem::Epsg(code) => self.registry.contains(*code).then_some(*code),
            ReferenceSystem::Wkt(text) => wkt::parse(text)
                .ok()
                .and_then(|root| self.registry.identify(&root).map(|def| def.epsg)),
            ReferenceSystem::Undefined => None,
        }
    }

    fn resolve_epsg(&self, code: EpsgCode) -> Result<ReferenceSystem, CrsError> {
        if self.registry.contains(code) {
            Ok(ReferenceSystem::Epsg(code))
        } else {
            self.unresolved(format!("EPSG:{code} is not in the registry"))
        }
    }

    fn unresolved(&self, reason: String) -> Result<ReferenceSystem, CrsError> {
        self.give_up(reason)
            .map(|none: Option<ReferenceSystem>| none.unwrap_or_default())
    }

    fn give_up<T>(&self, reason: String) -> Result<Option<T>, CrsError> {
        match self.mode {
            LookupMode::Permissive => {
                log::warn!("{reason}; reference system treated as undefined");
                Ok(None)
            }
            LookupMode::Strict => Err(CrsError::InvalidReferenceSystem(reason)),
        }
    }
}
