use std::marker::PhantomData;

use byteorder::{ByteOrder, LittleEndian};

use crate::errors::NtfsError;

/// Курсор над заимствованным срезом байт с обязательной проверкой границ.
/// Числовые чтения идут через byteorder; порядок байт задаётся параметром типа.
/// Любое чтение за пределами среза — ошибка BoundsExceeded, молчаливых
/// усечений нет. Под-срезы не владеют данными и не переживают исходный буфер.
pub struct ByteCursor<'a, O: ByteOrder = LittleEndian> {
    data: &'a [u8],
    order: PhantomData<O>,
}

impl<'a> ByteCursor<'a, LittleEndian> {
    /// Курсор в little-endian — родной порядок всех структур NTFS на диске.
    pub fn le(data: &'a [u8]) -> Self {
        Self::with_order(data)
    }
}

impl<'a, O: ByteOrder> ByteCursor<'a, O> {
    pub fn with_order(data: &'a [u8]) -> Self {
        ByteCursor {
            data,
            order: PhantomData,
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    fn check(&self, offset: usize, length: usize) -> Result<(), NtfsError> {
        match offset.checked_add(length) {
            Some(end) if end <= self.data.len() => Ok(()),
            _ => Err(NtfsError::BoundsExceeded {
                offset,
                length,
                available: self.data.len(),
            }),
        }
    }

    /// Под-срез (offset, length) без копирования.
    pub fn slice(&self, offset: usize, length: usize) -> Result<&'a [u8], NtfsError> {
        self.check(offset, length)?;
        Ok(&self.data[offset..offset + length])
    }

    /// Хвост среза начиная с offset; offset == len даёт пустой срез.
    pub fn slice_from(&self, offset: usize) -> Result<&'a [u8], NtfsError> {
        if offset > self.data.len() {
            return Err(NtfsError::BoundsExceeded {
                offset,
                length: 0,
                available: self.data.len(),
            });
        }
        Ok(&self.data[offset..])
    }

    pub fn u8(&self, offset: usize) -> Result<u8, NtfsError> {
        Ok(self.slice(offset, 1)?[0])
    }

    pub fn u16(&self, offset: usize) -> Result<u16, NtfsError> {
        Ok(O::read_u16(self.slice(offset, 2)?))
    }

    pub fn u32(&self, offset: usize) -> Result<u32, NtfsError> {
        Ok(O::read_u32(self.slice(offset, 4)?))
    }

    pub fn u64(&self, offset: usize) -> Result<u64, NtfsError> {
        Ok(O::read_u64(self.slice(offset, 8)?))
    }

    /// Число из width байт (0..=8) без знака, дополненное нулями до 64 бит.
    pub fn uint(&self, offset: usize, width: usize) -> Result<u64, NtfsError> {
        if width == 0 {
            return Ok(0);
        }
        if width > 8 {
            return Err(NtfsError::BoundsExceeded {
                offset,
                length: width,
                available: self.data.len(),
            });
        }
        Ok(O::read_uint(self.slice(offset, width)?, width))
    }

    /// Число из width байт (0..=8) со знаком: старший бит старшего байта
    /// расширяется до 64 бит в дополнительном коде.
    pub fn int(&self, offset: usize, width: usize) -> Result<i64, NtfsError> {
        if width == 0 {
            return Ok(0);
        }
        if width > 8 {
            return Err(NtfsError::BoundsExceeded {
                offset,
                length: width,
                available: self.data.len(),
            });
        }
        Ok(O::read_int(self.slice(offset, width)?, width))
    }

    /// Декодирует code_units кодовых единиц UTF-16 (по 2 байта) в строку.
    /// Суррогатные пары собираются в символы, непарные суррогаты — U+FFFD.
    pub fn utf16(&self, offset: usize, code_units: usize) -> Result<String, NtfsError> {
        let byte_len = code_units.checked_mul(2).ok_or(NtfsError::BoundsExceeded {
            offset,
            length: usize::MAX,
            available: self.data.len(),
        })?;
        let raw = self.slice(offset, byte_len)?;
        let mut units = vec![0u16; code_units];
        O::read_u16_into(raw, &mut units);
        Ok(String::from_utf16_lossy(&units))
    }
}
