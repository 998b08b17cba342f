use crate::cursor::ByteCursor;
use crate::errors::NtfsError;

/// Тип атрибута. На диске это произвольное 32-битное поле, поэтому
/// неизвестные коды сохраняются как есть, без потерь.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AttributeType(pub u32);

impl AttributeType {
    pub const STANDARD_INFORMATION: AttributeType = AttributeType(0x10);
    pub const ATTRIBUTE_LIST: AttributeType = AttributeType(0x20);
    pub const FILE_NAME: AttributeType = AttributeType(0x30);
    pub const OBJECT_ID: AttributeType = AttributeType(0x40);
    pub const SECURITY_DESCRIPTOR: AttributeType = AttributeType(0x50);
    pub const VOLUME_NAME: AttributeType = AttributeType(0x60);
    pub const VOLUME_INFORMATION: AttributeType = AttributeType(0x70);
    pub const DATA: AttributeType = AttributeType(0x80);
    pub const INDEX_ROOT: AttributeType = AttributeType(0x90);
    pub const INDEX_ALLOCATION: AttributeType = AttributeType(0xA0);
    pub const BITMAP: AttributeType = AttributeType(0xB0);
    pub const REPARSE_POINT: AttributeType = AttributeType(0xC0);
    pub const EA_INFORMATION: AttributeType = AttributeType(0xD0);
    pub const EA: AttributeType = AttributeType(0xE0);
    pub const PROPERTY_SET: AttributeType = AttributeType(0xF0);
    pub const LOGGED_UTILITY_STREAM: AttributeType = AttributeType(0x100);
    /// Маркер конца списка атрибутов; в результаты разбора не попадает.
    pub const TERMINATOR: AttributeType = AttributeType(0xFFFF_FFFF);

    /// Имя типа; для неизвестных кодов — "unknown".
    pub fn name(&self) -> &'static str {
        match *self {
            Self::STANDARD_INFORMATION => "$STANDARD_INFORMATION",
            Self::ATTRIBUTE_LIST => "$ATTRIBUTE_LIST",
            Self::FILE_NAME => "$FILE_NAME",
            Self::OBJECT_ID => "$OBJECT_ID",
            Self::SECURITY_DESCRIPTOR => "$SECURITY_DESCRIPTOR",
            Self::VOLUME_NAME => "$VOLUME_NAME",
            Self::VOLUME_INFORMATION => "$VOLUME_INFORMATION",
            Self::DATA => "$DATA",
            Self::INDEX_ROOT => "$INDEX_ROOT",
            Self::INDEX_ALLOCATION => "$INDEX_ALLOCATION",
            Self::BITMAP => "$BITMAP",
            Self::REPARSE_POINT => "$REPARSE_POINT",
            Self::EA_INFORMATION => "$EA_INFORMATION",
            Self::EA => "$EA",
            Self::PROPERTY_SET => "$PROPERTY_SET",
            Self::LOGGED_UTILITY_STREAM => "$LOGGED_UTILITY_STREAM",
            _ => "unknown",
        }
    }
}

/// Битовые флаги содержимого атрибута.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeFlags(pub u16);

impl AttributeFlags {
    pub const COMPRESSED: u16 = 0x0001;
    pub const ENCRYPTED: u16 = 0x4000;
    pub const SPARSE: u16 = 0x8000;

    pub fn contains(&self, mask: u16) -> bool {
        self.0 & mask == mask
    }

    pub fn is_compressed(&self) -> bool {
        self.contains(Self::COMPRESSED)
    }

    pub fn is_encrypted(&self) -> bool {
        self.contains(Self::ENCRYPTED)
    }

    pub fn is_sparse(&self) -> bool {
        self.contains(Self::SPARSE)
    }
}

/// Заголовок атрибута и его сырые данные, скопированные из записи.
/// Для резидентного атрибута data — само содержимое; для нерезидентного —
/// закодированный список data runs (разбирается в mft::datarun).
/// Размеры allocated/actual заполняются только для нерезидентных атрибутов.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub attr_type: AttributeType,
    pub resident: bool,
    pub name: Option<String>,
    pub flags: AttributeFlags,
    pub attribute_id: u16,
    pub allocated_size: u64,
    pub actual_size: u64,
    pub data: Vec<u8>,
}

/// Минимальный размер заголовка атрибута.
const ATTRIBUTE_MIN: usize = 22;

/// Разбирает один атрибут из среза ровно его длины (record length).
pub fn parse_attribute(data: &[u8]) -> Result<Attribute, NtfsError> {
    if data.len() < ATTRIBUTE_MIN {
        return Err(NtfsError::MalformedAttribute(format!(
            "атрибут должен занимать не менее {ATTRIBUTE_MIN} байт, получено {}",
            data.len()
        )));
    }
    let r = ByteCursor::le(data);

    let name_length = r.u8(0x09)? as usize;
    let name = if name_length != 0 {
        let name_offset = r.u16(0x0A)? as usize;
        Some(r.utf16(name_offset, name_length)?)
    } else {
        None
    };

    let resident = r.u8(0x08)? == 0;
    let (data_bytes, allocated_size, actual_size) = if resident {
        let data_length = r.u32(0x10)?;
        if data_length as u64 > isize::MAX as u64 {
            return Err(NtfsError::MalformedAttribute(format!(
                "длина данных {data_length} не помещается в адресное пространство"
            )));
        }
        let data_offset = r.u16(0x14)? as usize;
        let end = data_offset
            .checked_add(data_length as usize)
            .unwrap_or(usize::MAX);
        if end > data.len() {
            return Err(NtfsError::MalformedAttribute(format!(
                "резидентные данные ({data_offset} + {data_length}) выходят за пределы атрибута длиной {}",
                data.len()
            )));
        }
        (r.slice(data_offset, data_length as usize)?.to_vec(), 0, 0)
    } else {
        let data_offset = r.u16(0x20)? as usize;
        if data_offset > data.len() {
            return Err(NtfsError::MalformedAttribute(format!(
                "смещение data runs {data_offset} за пределами атрибута длиной {}",
                data.len()
            )));
        }
        let allocated_size = r.u64(0x28)?;
        let actual_size = r.u64(0x30)?;
        (r.slice_from(data_offset)?.to_vec(), allocated_size, actual_size)
    };

    Ok(Attribute {
        attr_type: AttributeType(r.u32(0x00)?),
        resident,
        name,
        flags: AttributeFlags(r.u16(0x0C)?),
        attribute_id: r.u16(0x0E)?,
        allocated_size,
        actual_size,
        data: data_bytes,
    })
}

/// Обход потока атрибутов: до маркера 0xFFFFFFFF либо до конца буфера.
/// Длина каждого атрибута берётся из его заголовка; нулевая или вылезающая
/// за остаток буфера длина — повреждение.
pub fn parse_attributes(mut b: &[u8]) -> Result<Vec<Attribute>, NtfsError> {
    let mut attributes = Vec::new();
    while !b.is_empty() {
        if b.len() < 4 {
            return Err(NtfsError::MalformedAttribute(format!(
                "заголовок атрибута: нужно минимум 4 байта, осталось {}",
                b.len()
            )));
        }
        let r = ByteCursor::le(b);
        if r.u32(0)? == AttributeType::TERMINATOR.0 {
            break;
        }
        if b.len() < 8 {
            return Err(NtfsError::MalformedAttribute(format!(
                "не дочитать длину атрибута: осталось {} байт",
                b.len()
            )));
        }
        let record_length = r.u32(0x04)?;
        if record_length == 0 {
            return Err(NtfsError::MalformedAttribute("атрибут нулевой длины".into()));
        }
        if record_length as u64 > isize::MAX as u64 {
            return Err(NtfsError::MalformedAttribute(format!(
                "длина атрибута {record_length} не помещается в адресное пространство"
            )));
        }
        let record_length = record_length as usize;
        if record_length > b.len() {
            return Err(NtfsError::MalformedAttribute(format!(
                "длина атрибута {record_length} превышает остаток буфера {}",
                b.len()
            )));
        }
        attributes.push(parse_attribute(&b[..record_length])?);
        b = &b[record_length..];
    }
    Ok(attributes)
}
