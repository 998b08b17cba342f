use chrono::{DateTime, Utc};

use crate::cursor::ByteCursor;
use crate::errors::NtfsError;
use crate::mft::attribute::AttributeType;
use crate::mft::record::FileReference;
use crate::mft::utils::filetime_to_datetime;

/// DOS/NTFS флаги файла из $STANDARD_INFORMATION и $FILE_NAME.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileAttributes(pub u32);

impl FileAttributes {
    pub const READ_ONLY: u32 = 0x0001;
    pub const HIDDEN: u32 = 0x0002;
    pub const SYSTEM: u32 = 0x0004;
    pub const ARCHIVE: u32 = 0x0020;
    pub const DEVICE: u32 = 0x0040;
    pub const NORMAL: u32 = 0x0080;
    pub const TEMPORARY: u32 = 0x0100;
    pub const SPARSE_FILE: u32 = 0x0200;
    pub const REPARSE_POINT: u32 = 0x0400;
    /// На диске 0x1000 означает и compressed, и offline; смысл зависит от контекста.
    pub const COMPRESSED_OR_OFFLINE: u32 = 0x1000;
    pub const NOT_CONTENT_INDEXED: u32 = 0x2000;
    pub const ENCRYPTED: u32 = 0x4000;

    pub fn contains(&self, mask: u32) -> bool {
        self.0 & mask == mask
    }
}

/// $STANDARD_INFORMATION (0x10). Хвостовые поля (owner id и дальше)
/// появились в NTFS 3.0: на коротких структурах остаются нулями.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StandardInformation {
    pub creation_time: DateTime<Utc>,
    pub file_last_modified: DateTime<Utc>,
    pub mft_last_modified: DateTime<Utc>,
    pub last_access: DateTime<Utc>,
    pub file_attributes: FileAttributes,
    pub maximum_number_of_versions: u32,
    pub version_number: u32,
    pub class_id: u32,
    pub owner_id: u32,
    pub security_id: u32,
    pub quota_charged: u64,
    pub update_sequence_number: u64,
}

impl StandardInformation {
    pub fn parse(data: &[u8]) -> Result<Self, NtfsError> {
        if data.len() < 48 {
            return Err(NtfsError::MalformedAttribute(format!(
                "$STANDARD_INFORMATION должен занимать не менее 48 байт, получено {}",
                data.len()
            )));
        }
        let r = ByteCursor::le(data);

        let owner_id = if data.len() >= 0x34 { r.u32(0x30)? } else { 0 };
        let security_id = if data.len() >= 0x38 { r.u32(0x34)? } else { 0 };
        let quota_charged = if data.len() >= 0x40 { r.u64(0x38)? } else { 0 };
        let update_sequence_number = if data.len() >= 0x48 { r.u64(0x40)? } else { 0 };

        Ok(StandardInformation {
            creation_time: filetime_to_datetime(r.u64(0x00)?),
            file_last_modified: filetime_to_datetime(r.u64(0x08)?),
            mft_last_modified: filetime_to_datetime(r.u64(0x10)?),
            last_access: filetime_to_datetime(r.u64(0x18)?),
            file_attributes: FileAttributes(r.u32(0x20)?),
            maximum_number_of_versions: r.u32(0x24)?,
            version_number: r.u32(0x28)?,
            class_id: r.u32(0x2C)?,
            owner_id,
            security_id,
            quota_charged,
            update_sequence_number,
        })
    }
}

/// Пространство имён файла в $FILE_NAME.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileNameNamespace {
    Posix,
    Win32,
    Dos,
    Win32AndDos,
    Unknown(u8),
}

impl From<u8> for FileNameNamespace {
    fn from(b: u8) -> Self {
        match b {
            0 => FileNameNamespace::Posix,
            1 => FileNameNamespace::Win32,
            2 => FileNameNamespace::Dos,
            3 => FileNameNamespace::Win32AndDos,
            other => FileNameNamespace::Unknown(other),
        }
    }
}

/// $FILE_NAME (0x30).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileName {
    pub parent_file_reference: FileReference,
    pub creation_time: DateTime<Utc>,
    pub file_last_modified: DateTime<Utc>,
    pub mft_last_modified: DateTime<Utc>,
    pub last_access: DateTime<Utc>,
    pub allocated_size: u64,
    pub real_size: u64,
    pub flags: FileAttributes,
    pub extended_data: u32,
    pub namespace: FileNameNamespace,
    pub name: String,
}

impl FileName {
    pub fn parse(data: &[u8]) -> Result<Self, NtfsError> {
        if data.len() < 66 {
            return Err(NtfsError::MalformedAttribute(format!(
                "$FILE_NAME должен занимать не менее 66 байт, получено {}",
                data.len()
            )));
        }
        let r = ByteCursor::le(data);

        // длина имени задана в кодовых единицах UTF-16
        let name_units = r.u8(0x40)? as usize;
        if data.len() < 66 + name_units * 2 {
            return Err(NtfsError::MalformedAttribute(format!(
                "$FILE_NAME обрезан: имя из {name_units} единиц не помещается в {} байт",
                data.len()
            )));
        }

        Ok(FileName {
            parent_file_reference: FileReference::read(&r, 0x00)?,
            creation_time: filetime_to_datetime(r.u64(0x08)?),
            file_last_modified: filetime_to_datetime(r.u64(0x10)?),
            mft_last_modified: filetime_to_datetime(r.u64(0x18)?),
            last_access: filetime_to_datetime(r.u64(0x20)?),
            allocated_size: r.u64(0x28)?,
            real_size: r.u64(0x30)?,
            flags: FileAttributes(r.u32(0x38)?),
            extended_data: r.u32(0x3C)?,
            namespace: FileNameNamespace::from(r.u8(0x41)?),
            name: r.utf16(0x42, name_units)?,
        })
    }
}

/// Одна запись $ATTRIBUTE_LIST (0x20): где искать атрибут, вынесенный в
/// другую запись. Сами записи-расширения здесь не собираются — это забота
/// вызывающего.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeListEntry {
    pub attr_type: AttributeType,
    pub name: Option<String>,
    pub starting_vcn: u64,
    pub base_record_reference: FileReference,
    pub attribute_id: u16,
}

/// Минимальный размер записи $ATTRIBUTE_LIST.
const ATTRIBUTE_LIST_ENTRY_MIN: usize = 0x1A;

/// Обход записей $ATTRIBUTE_LIST. Длина каждой записи — u16 по смещению 0x04;
/// ссылка на базовую запись лежит по 0x10.
pub fn parse_attribute_list(mut b: &[u8]) -> Result<Vec<AttributeListEntry>, NtfsError> {
    if b.len() < ATTRIBUTE_LIST_ENTRY_MIN {
        return Err(NtfsError::MalformedAttribute(format!(
            "$ATTRIBUTE_LIST должен занимать не менее {ATTRIBUTE_LIST_ENTRY_MIN} байт, получено {}",
            b.len()
        )));
    }

    let mut entries = Vec::new();
    while !b.is_empty() {
        if b.len() < ATTRIBUTE_LIST_ENTRY_MIN {
            return Err(NtfsError::MalformedAttribute(format!(
                "хвост $ATTRIBUTE_LIST из {} байт меньше минимальной записи",
                b.len()
            )));
        }
        let r = ByteCursor::le(b);

        let entry_length = r.u16(0x04)? as usize;
        if entry_length < ATTRIBUTE_LIST_ENTRY_MIN || entry_length > b.len() {
            return Err(NtfsError::MalformedAttribute(format!(
                "запись $ATTRIBUTE_LIST длиной {entry_length} при остатке {}",
                b.len()
            )));
        }

        let name_length = r.u8(0x06)? as usize;
        let name = if name_length != 0 {
            let name_offset = r.u8(0x07)? as usize;
            if name_offset + name_length * 2 > entry_length {
                return Err(NtfsError::MalformedAttribute(format!(
                    "имя в записи $ATTRIBUTE_LIST выходит за её длину {entry_length}"
                )));
            }
            Some(r.utf16(name_offset, name_length)?)
        } else {
            None
        };

        entries.push(AttributeListEntry {
            attr_type: AttributeType(r.u32(0x00)?),
            name,
            starting_vcn: r.u64(0x08)?,
            base_record_reference: FileReference::read(&r, 0x10)?,
            attribute_id: r.u16(0x18)?,
        });
        b = &b[entry_length..];
    }
    Ok(entries)
}

/// Заголовок $INDEX_ROOT (0x90) и его записи. Поддерживается только индекс
/// по $FILE_NAME (каталоги); прочие индексируемые типы не реализованы.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexRoot {
    pub indexed_attribute_type: AttributeType,
    pub collation_type: u32,
    pub bytes_per_record: u32,
    pub clusters_per_record: u32,
    pub flags: u32,
    pub entries: Vec<IndexEntry>,
}

impl IndexRoot {
    pub fn parse(data: &[u8]) -> Result<Self, NtfsError> {
        if data.len() < 32 {
            return Err(NtfsError::MalformedAttribute(format!(
                "$INDEX_ROOT должен занимать не менее 32 байт, получено {}",
                data.len()
            )));
        }
        let r = ByteCursor::le(data);

        let indexed_attribute_type = AttributeType(r.u32(0x00)?);
        if indexed_attribute_type != AttributeType::FILE_NAME {
            return Err(NtfsError::UnsupportedAttribute(format!(
                "в $INDEX_ROOT индексируется тип {:#x} ({}); поддерживается только $FILE_NAME",
                indexed_attribute_type.0,
                indexed_attribute_type.name()
            )));
        }

        let total_size = r.u32(0x14)? as usize;
        let expected = total_size
            .checked_add(16)
            .unwrap_or(usize::MAX);
        if data.len() < expected {
            return Err(NtfsError::MalformedAttribute(format!(
                "$INDEX_ROOT обещает {expected} байт, получено {}",
                data.len()
            )));
        }

        let entries = if total_size >= 16 {
            parse_index_entries(r.slice(0x20, total_size - 16)?)?
        } else {
            Vec::new()
        };

        Ok(IndexRoot {
            indexed_attribute_type,
            collation_type: r.u32(0x04)?,
            bytes_per_record: r.u32(0x08)?,
            clusters_per_record: r.u32(0x0C)?,
            flags: r.u32(0x1C)?,
            entries,
        })
    }
}

/// Запись индекса каталога ($INDEX_ROOT / блок $INDEX_ALLOCATION).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    pub file_reference: FileReference,
    pub flags: u32,
    /// Вложенный $FILE_NAME; у записи-ограничителя узла его нет.
    pub file_name: Option<FileName>,
    /// VCN поддерева, если запись на него указывает.
    pub sub_node_vcn: Option<u64>,
}

impl IndexEntry {
    pub const FLAG_POINTS_TO_SUBNODE: u32 = 0b01;
    pub const FLAG_LAST_IN_NODE: u32 = 0b10;

    pub fn points_to_subnode(&self) -> bool {
        self.flags & Self::FLAG_POINTS_TO_SUBNODE != 0
    }

    pub fn is_last_in_node(&self) -> bool {
        self.flags & Self::FLAG_LAST_IN_NODE != 0
    }
}

/// Минимальный размер записи индекса.
const INDEX_ENTRY_MIN: usize = 0x10;

/// Обход записей индекса. Последняя запись узла — ограничитель: вложенного
/// $FILE_NAME в ней нет, и после неё обход останавливается.
pub fn parse_index_entries(mut b: &[u8]) -> Result<Vec<IndexEntry>, NtfsError> {
    let mut entries = Vec::new();
    while !b.is_empty() {
        if b.len() < INDEX_ENTRY_MIN {
            return Err(NtfsError::MalformedAttribute(format!(
                "запись индекса: нужно минимум {INDEX_ENTRY_MIN} байт, осталось {}",
                b.len()
            )));
        }
        let r = ByteCursor::le(b);

        let entry_length = r.u16(0x08)? as usize;
        if entry_length < INDEX_ENTRY_MIN || entry_length > b.len() {
            return Err(NtfsError::MalformedAttribute(format!(
                "запись индекса длиной {entry_length} при остатке {}",
                b.len()
            )));
        }

        let content_length = r.u16(0x0A)? as usize;
        let flags = r.u32(0x0C)?;
        let last_in_node = flags & IndexEntry::FLAG_LAST_IN_NODE != 0;
        let points_to_subnode = flags & IndexEntry::FLAG_POINTS_TO_SUBNODE != 0;

        let file_name = if content_length != 0 && !last_in_node {
            Some(FileName::parse(r.slice(0x10, content_length)?)?)
        } else {
            None
        };
        let sub_node_vcn = if points_to_subnode {
            Some(r.u64(entry_length - 8)?)
        } else {
            None
        };

        entries.push(IndexEntry {
            file_reference: FileReference::read(&r, 0x00)?,
            flags,
            file_name,
            sub_node_vcn,
        });

        if last_in_node {
            break;
        }
        b = &b[entry_length..];
    }
    Ok(entries)
}

/// Заголовок блока $INDEX_ALLOCATION (0xA0) — сигнатура "INDX" и геометрия
/// узла. Сигнатура не проверяется, а лишь выставляется наружу: решает
/// вызывающий. Байт «не лист» и сквозной номер читаются, когда буфер их
/// действительно содержит.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexBlockHeader {
    pub signature: [u8; 4],
    pub update_sequence_offset: u16,
    pub update_sequence_size: u16,
    pub update_sequence_number: u16,
    pub logfile_sequence_number: u64,
    pub block_vcn: u64,
    pub entries_offset: u32,
    pub entries_total_size: u32,
    pub entries_allocated_size: u32,
    pub not_leaf: bool,
}

impl IndexBlockHeader {
    pub const SIGNATURE: [u8; 4] = *b"INDX";
    /// Фиксированная часть заголовка.
    const MIN_LEN: usize = 36;

    pub fn parse(data: &[u8]) -> Result<Self, NtfsError> {
        if data.len() < Self::MIN_LEN {
            return Err(NtfsError::MalformedAttribute(format!(
                "заголовок блока индекса должен занимать не менее {} байт, получено {}",
                Self::MIN_LEN,
                data.len()
            )));
        }
        let r = ByteCursor::le(data);

        let mut signature = [0u8; 4];
        signature.copy_from_slice(r.slice(0x00, 4)?);

        let update_sequence_offset = r.u16(0x04)?;
        let uso = update_sequence_offset as usize;
        let update_sequence_number = if data.len() >= uso + 2 { r.u16(uso)? } else { 0 };
        let not_leaf = if data.len() > 0x24 { r.u8(0x24)? != 0 } else { false };

        Ok(IndexBlockHeader {
            signature,
            update_sequence_offset,
            update_sequence_size: r.u16(0x06)?,
            update_sequence_number,
            logfile_sequence_number: r.u64(0x08)?,
            block_vcn: r.u64(0x10)?,
            entries_offset: r.u32(0x18)?,
            entries_total_size: r.u32(0x1C)?,
            entries_allocated_size: r.u32(0x20)?,
            not_leaf,
        })
    }

    pub fn has_valid_signature(&self) -> bool {
        self.signature == Self::SIGNATURE
    }
}
