use byteorder::ByteOrder;

use crate::cursor::ByteCursor;
use crate::errors::NtfsError;
use crate::mft::attribute::{parse_attributes, Attribute, AttributeType};

/// Сигнатура валидной записи MFT. "BAAD" и прочее отбрасывается.
const FILE_SIGNATURE: [u8; 4] = *b"FILE";
/// Минимальный размер заголовка записи.
const RECORD_HEADER_MIN: usize = 42;

/// Ссылка на запись MFT: 48-битный номер записи + 16-битный sequence number.
/// Вместе они идентифицируют конкретное поколение записи.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileReference {
    pub record_number: u64,
    pub sequence_number: u16,
}

impl FileReference {
    /// Восемь байт little-endian: младшие 6 — номер записи, старшие 2 — sequence.
    pub fn from_bytes(b: [u8; 8]) -> Self {
        FileReference {
            record_number: u64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], 0, 0]),
            sequence_number: u16::from_le_bytes([b[6], b[7]]),
        }
    }

    pub(crate) fn read<O: ByteOrder>(r: &ByteCursor<O>, offset: usize) -> Result<Self, NtfsError> {
        let b = r.slice(offset, 8)?;
        Ok(Self::from_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        ]))
    }

    pub fn is_zero(&self) -> bool {
        self.record_number == 0 && self.sequence_number == 0
    }
}

/// Битовая маска состояния записи MFT.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordFlags(pub u16);

impl RecordFlags {
    pub const IN_USE: u16 = 0x0001;
    pub const IS_DIRECTORY: u16 = 0x0002;
    pub const IN_EXTEND: u16 = 0x0004;
    pub const IS_INDEX: u16 = 0x0008;

    pub fn contains(&self, mask: u16) -> bool {
        self.0 & mask == mask
    }

    pub fn is_in_use(&self) -> bool {
        self.contains(Self::IN_USE)
    }

    pub fn is_directory(&self) -> bool {
        self.contains(Self::IS_DIRECTORY)
    }
}

/// Заголовок записи MFT (без атрибутов).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MftRecordHeader {
    pub signature: [u8; 4],
    pub update_sequence_offset: u16,
    pub update_sequence_size: u16,
    pub logfile_sequence_number: u64,
    pub sequence_number: u16,
    pub hard_link_count: u16,
    pub first_attribute_offset: u16,
    pub flags: RecordFlags,
    pub actual_size: u32,
    pub allocated_size: u32,
    pub base_record_reference: FileReference,
    pub next_attribute_id: u16,
    pub record_number: u32,
}

impl MftRecordHeader {
    pub fn parse(data: &[u8]) -> Result<Self, NtfsError> {
        if data.len() < RECORD_HEADER_MIN {
            return Err(NtfsError::MalformedRecord(format!(
                "заголовок записи должен занимать не менее {RECORD_HEADER_MIN} байт, получено {}",
                data.len()
            )));
        }
        let r = ByteCursor::le(data);

        let sig = r.slice(0, 4)?;
        if sig != FILE_SIGNATURE {
            return Err(NtfsError::BadSignature {
                found: [sig[0], sig[1], sig[2], sig[3]],
            });
        }

        // Собственный номер записи дописан в заголовок не на всех версиях NTFS;
        // читаем его, только когда байты реально есть.
        let record_number = if data.len() >= 0x30 { r.u32(0x2C)? } else { 0 };

        Ok(MftRecordHeader {
            signature: FILE_SIGNATURE,
            update_sequence_offset: r.u16(0x04)?,
            update_sequence_size: r.u16(0x06)?,
            logfile_sequence_number: r.u64(0x08)?,
            sequence_number: r.u16(0x10)?,
            hard_link_count: r.u16(0x12)?,
            first_attribute_offset: r.u16(0x14)?,
            flags: RecordFlags(r.u16(0x16)?),
            actual_size: r.u32(0x18)?,
            allocated_size: r.u32(0x1C)?,
            base_record_reference: FileReference::read(&r, 0x20)?,
            next_attribute_id: r.u16(0x28)?,
            record_number,
        })
    }

    /// Ссылка записи на саму себя.
    pub fn file_reference(&self) -> FileReference {
        FileReference {
            record_number: self.record_number as u64,
            sequence_number: self.sequence_number,
        }
    }

    /// Базовая запись (не расширение): ссылка на базу нулевая.
    pub fn is_base_record(&self) -> bool {
        self.base_record_reference.is_zero()
    }
}

/// Применяет NTFS update sequence (fixup) на месте. Последние два байта
/// каждого сектора на диске подменены сквозным номером; оригиналы лежат в
/// массиве за номером. Сначала сверяем все сектора, затем восстанавливаем —
/// запись с расхождением не трогаем вовсе.
///
/// Работает на буфере, который вызывающий уже скопировал: после успешного
/// применения хвосты секторов содержат данные, и повторный вызов закончится
/// ошибкой FixUpMismatch.
pub fn apply_fix_up(
    data: &mut [u8],
    update_sequence_offset: usize,
    update_sequence_size: usize,
) -> Result<(), NtfsError> {
    // размер задан в парах по 2 байта: сам номер + по паре на сектор
    if update_sequence_size < 2 {
        return Err(NtfsError::MalformedRecord(format!(
            "update sequence из {update_sequence_size} пар не покрывает ни одного сектора"
        )));
    }
    let end = update_sequence_offset
        .checked_add(update_sequence_size * 2)
        .unwrap_or(usize::MAX);
    if end > data.len() {
        return Err(NtfsError::MalformedRecord(format!(
            "массив update sequence ({update_sequence_offset} + {} байт) за пределами записи длиной {}",
            update_sequence_size * 2,
            data.len()
        )));
    }

    let usn = [data[update_sequence_offset], data[update_sequence_offset + 1]];
    let array_start = update_sequence_offset + 2;
    let sector_count = update_sequence_size - 1;
    let sector_size = data.len() / sector_count;
    if sector_size < 2 {
        return Err(NtfsError::MalformedRecord(format!(
            "запись из {} байт не делится на {sector_count} секторов",
            data.len()
        )));
    }

    for i in 1..=sector_count {
        let tail = sector_size * i - 2;
        if data[tail] != usn[0] || data[tail + 1] != usn[1] {
            return Err(NtfsError::FixUpMismatch {
                sector: i,
                expected: u16::from_le_bytes(usn),
                found: u16::from_le_bytes([data[tail], data[tail + 1]]),
            });
        }
    }

    for i in 0..sector_count {
        let tail = sector_size * (i + 1) - 2;
        let src = array_start + i * 2;
        data[tail] = data[src];
        data[tail + 1] = data[src + 1];
    }

    Ok(())
}

/// Разобранная запись MFT: заголовок и заголовки атрибутов с их сырыми
/// данными. Содержимое типизированных атрибутов разбирается отдельно
/// (mft::attributes), список data runs — в mft::datarun.
#[derive(Debug)]
pub struct MftRecord {
    pub header: MftRecordHeader,
    pub attributes: Vec<Attribute>,
}

impl MftRecord {
    /// Полный разбор записи: заголовок, собственная копия буфера, fixup,
    /// обход атрибутов. Буфер вызывающего не изменяется — иначе повторный
    /// разбор увидел бы уже восстановленные байты и провалил сверку.
    pub fn parse(data: &[u8]) -> Result<Self, NtfsError> {
        let header = MftRecordHeader::parse(data)?;

        let first_attribute_offset = header.first_attribute_offset as usize;
        if first_attribute_offset >= data.len() {
            return Err(NtfsError::MalformedRecord(format!(
                "смещение первого атрибута {first_attribute_offset} за пределами записи длиной {}",
                data.len()
            )));
        }

        let mut buf = data.to_vec();
        apply_fix_up(
            &mut buf,
            header.update_sequence_offset as usize,
            header.update_sequence_size as usize,
        )?;

        let attributes = parse_attributes(&buf[first_attribute_offset..])?;
        Ok(MftRecord { header, attributes })
    }

    /// Все атрибуты запрошенного типа в порядке следования в записи.
    pub fn find_attributes(&self, attr_type: AttributeType) -> Vec<&Attribute> {
        self.attributes
            .iter()
            .filter(|a| a.attr_type == attr_type)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use crate::mft::utils::unhex;

    use super::*;

    /// Живая запись MFT (1024 байта): значимые 672 байта, хвост из нулей и
    /// сквозной номер 0x000C в последних двух байтах второго сектора.
    fn captured_record() -> Vec<u8> {
        let mut b = unhex(
            "46494c4530000300755762ef1900000015000200380001009802000000040000\
             0000000000000000060000002a0000000c000000000000001000000060000000\
             000000000000000048000000180000007e31192b21d6d50186468bb40eded401\
             2e7d4e954dcbd5016c7f192b21d6d50120000400000000000000000000000000\
             00000000161300000000000000000000a068d14a050000003000000078000000\
             00000000000003005a000000180001003b000000000009007e31192b21d6d501\
             7e31192b21d6d5017e31192b21d6d5017e31192b21d6d5010020040000000000\
             000000000000000020000000000000000c0249004e0054004c00500052007e00\
             31002e0044004c004c0000000000000030000000800000000000000000000200\
             62000000180001003b000000000009007e31192b21d6d5017e31192b21d6d501\
             7e31192b21d6d5017e31192b21d6d50100200400000000000000000000000000\
             2000000000000000100149006e0074006c00500072006f007600690064006500\
             72002e0064006c006c0000000000000080000000480000000100000000000100\
             0000000000000000410000000000000040000000000000000020040000000000\
             381704000000000038170400000000004142f46ea0000000d000000020000000\
             00000000000004000800000018000000780000007c000000e000000098000c00\
             00000000000005007c000000180000007c000000000f64002443492e43415441\
             4c4f4748494e5400010060004d6963726f736f66742d57696e646f77732d436c\
             69656e742d4465736b746f702d52657175697265642d5061636b616765303431\
             367e333162663338353661643336346533357e616d6436347e7e31302e302e31\
             383336322e3539322e63617400000000ffffffff827947110000000000000000",
        );
        b.resize(1024, 0);
        b[1022..].copy_from_slice(&[0x0C, 0x00]);
        b
    }

    #[test]
    fn file_reference_from_bytes() {
        let r = FileReference::from_bytes([26, 179, 6, 0, 0, 0, 45, 0]);
        assert_eq!(r.record_number, 439066);
        assert_eq!(r.sequence_number, 45);
        assert!(!r.is_zero());
        assert!(FileReference::from_bytes([0; 8]).is_zero());
    }

    #[test]
    fn record_flags_bits() {
        let f = RecordFlags(0);
        assert!(!f.is_in_use());
        assert!(!f.is_directory());

        let f = RecordFlags(3);
        assert!(f.is_in_use());
        assert!(f.is_directory());
        assert!(!f.contains(RecordFlags::IN_EXTEND));

        let f = RecordFlags(15);
        assert!(f.contains(RecordFlags::IN_EXTEND));
        assert!(f.contains(RecordFlags::IS_INDEX));
    }

    #[test]
    fn parses_captured_record_header() {
        let b = captured_record();
        let h = MftRecordHeader::parse(&b).unwrap();

        assert_eq!(h.signature, *b"FILE");
        assert_eq!(h.update_sequence_offset, 48);
        assert_eq!(h.update_sequence_size, 3);
        assert_eq!(h.logfile_sequence_number, 111390381941);
        assert_eq!(h.sequence_number, 21);
        assert_eq!(h.hard_link_count, 2);
        assert_eq!(h.first_attribute_offset, 56);
        assert!(h.flags.is_in_use());
        assert!(!h.flags.is_directory());
        assert_eq!(h.actual_size, 664);
        assert_eq!(h.allocated_size, 1024);
        assert!(h.is_base_record());
        assert_eq!(h.next_attribute_id, 6);
        assert_eq!(h.record_number, 42);
        assert_eq!(h.file_reference().record_number, 42);
    }

    #[test]
    fn header_parses_from_42_byte_prefix() {
        let b = captured_record();
        let h = MftRecordHeader::parse(&b[..42]).unwrap();
        assert_eq!(h.next_attribute_id, 6);
        // номера записи в 42 байтах нет — остаётся ноль
        assert_eq!(h.record_number, 0);
    }

    #[test]
    fn parses_captured_record_with_fixup_and_attributes() {
        let record = MftRecord::parse(&captured_record()).unwrap();
        let types: Vec<u32> = record.attributes.iter().map(|a| a.attr_type.0).collect();
        assert_eq!(types, [0x10, 0x30, 0x30, 0x80, 0xD0, 0xE0]);

        let data_attrs = record.find_attributes(AttributeType::DATA);
        assert_eq!(data_attrs.len(), 1);
        assert!(!data_attrs[0].resident);

        assert_eq!(record.find_attributes(AttributeType::FILE_NAME).len(), 2);
        assert!(record.find_attributes(AttributeType::BITMAP).is_empty());
    }

    #[test]
    fn caller_buffer_is_never_mutated() {
        let b = captured_record();
        let before = b.clone();
        let _ = MftRecord::parse(&b).unwrap();
        assert_eq!(b, before);
        // и поэтому повторный разбор того же буфера тоже проходит
        let _ = MftRecord::parse(&b).unwrap();
    }

    #[test]
    fn bad_signature_is_rejected() {
        let mut b = captured_record();
        b[..4].copy_from_slice(b"BAAD");
        match MftRecordHeader::parse(&b) {
            Err(NtfsError::BadSignature { found }) => assert_eq!(&found, b"BAAD"),
            other => panic!("ожидалась BadSignature, получено {other:?}"),
        }
    }

    #[test]
    fn short_record_is_malformed() {
        let b = captured_record();
        assert!(matches!(
            MftRecordHeader::parse(&b[..41]),
            Err(NtfsError::MalformedRecord(_))
        ));
        assert!(matches!(
            MftRecord::parse(&[]),
            Err(NtfsError::MalformedRecord(_))
        ));
    }

    #[test]
    fn first_attribute_offset_outside_record_is_malformed() {
        let mut b = captured_record();
        b[0x14..0x16].copy_from_slice(&1024u16.to_le_bytes());
        assert!(matches!(
            MftRecord::parse(&b),
            Err(NtfsError::MalformedRecord(_))
        ));
    }

    /// Запись из двух секторов по 512 байт: USN = 2, в массиве — пары
    /// A1 B2 и C3 D4, хвосты секторов заменены на USN, атрибутов нет.
    fn synthetic_fixup_record() -> Vec<u8> {
        let mut b = vec![0u8; 1024];
        b[..4].copy_from_slice(b"FILE");
        b[0x04..0x06].copy_from_slice(&48u16.to_le_bytes()); // update sequence offset
        b[0x06..0x08].copy_from_slice(&3u16.to_le_bytes()); // 1 номер + 2 сектора
        b[0x14..0x16].copy_from_slice(&56u16.to_le_bytes()); // первый атрибут
        b[48..50].copy_from_slice(&2u16.to_le_bytes()); // USN
        b[50..54].copy_from_slice(&[0xA1, 0xB2, 0xC3, 0xD4]); // оригинальные байты
        b[510..512].copy_from_slice(&2u16.to_le_bytes());
        b[1022..1024].copy_from_slice(&2u16.to_le_bytes());
        b[56..60].copy_from_slice(&0xFFFF_FFFFu32.to_le_bytes()); // сразу маркер конца
        b
    }

    #[test]
    fn fixup_restores_sector_tails() {
        let mut b = synthetic_fixup_record();
        apply_fix_up(&mut b, 48, 3).unwrap();
        assert_eq!(&b[510..512], &[0xA1, 0xB2]);
        assert_eq!(&b[1022..1024], &[0xC3, 0xD4]);

        // после восстановления в хвостах лежат данные, а не USN:
        // повторное применение обязано провалить сверку
        assert!(matches!(
            apply_fix_up(&mut b, 48, 3),
            Err(NtfsError::FixUpMismatch { .. })
        ));

        // и разбор записи целиком проходит
        let record = MftRecord::parse(&synthetic_fixup_record()).unwrap();
        assert!(record.attributes.is_empty());
    }

    #[test]
    fn fixup_mismatch_is_detected_per_sector() {
        let mut b = synthetic_fixup_record();
        b[1022] = 9; // хвост второго сектора разошёлся с USN
        match apply_fix_up(&mut b, 48, 3) {
            Err(NtfsError::FixUpMismatch { sector, expected, found }) => {
                assert_eq!(sector, 2);
                assert_eq!(expected, 2);
                assert_eq!(found, 9);
            }
            other => panic!("ожидался FixUpMismatch, получено {other:?}"),
        }
        // сверка идёт до восстановления: первый сектор остался нетронутым
        assert_eq!(&b[510..512], &2u16.to_le_bytes());
    }

    #[test]
    fn degenerate_update_sequence_is_malformed() {
        let mut b = synthetic_fixup_record();
        assert!(matches!(
            apply_fix_up(&mut b, 48, 1),
            Err(NtfsError::MalformedRecord(_))
        ));
        assert!(matches!(
            apply_fix_up(&mut b, 1020, 3),
            Err(NtfsError::MalformedRecord(_))
        ));
        // массив длиннее самой записи
        let mut tiny = vec![0u8; 8];
        assert!(matches!(
            apply_fix_up(&mut tiny, 0, 8),
            Err(NtfsError::MalformedRecord(_))
        ));
    }
}
