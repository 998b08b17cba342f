use thiserror::Error;

/// Единая таксономия ошибок декодеров NTFS и конвейера дампа.
/// Декодеры возвращают ошибку значением и ничего не чинят на месте;
/// конвейер пробрасывает первую ошибку вызывающему.
#[derive(Error, Debug)]
pub enum NtfsError {
    #[error("чтение за границами буфера: смещение {offset}, длина {length}, доступно {available}")]
    BoundsExceeded {
        offset: usize,
        length: usize,
        available: usize,
    },

    #[error("повреждённый загрузочный сектор: {0}")]
    MalformedBootSector(String),

    #[error("повреждённая запись MFT: {0}")]
    MalformedRecord(String),

    #[error("повреждённый атрибут: {0}")]
    MalformedAttribute(String),

    #[error("повреждённый список data runs: {0}")]
    MalformedDataRun(String),

    #[error("неизвестная сигнатура записи: {found:02x?} (ожидалась \"FILE\")")]
    BadSignature { found: [u8; 4] },

    #[error("несовпадение update sequence в секторе {sector}: на диске {found:#06x}, ожидалось {expected:#06x}")]
    FixUpMismatch {
        sector: usize,
        expected: u16,
        found: u16,
    },

    #[error("неподдерживаемая файловая система: OEM id {found:?} (ожидалось {expected:?})")]
    UnsupportedFilesystem {
        found: String,
        expected: &'static str,
    },

    #[error("неподдерживаемая форма атрибута: {0}")]
    UnsupportedAttribute(String),

    #[error("ошибка ввода-вывода: {0}")]
    Io(#[from] std::io::Error),

    #[error("seek попал не туда: запрошено {requested}, источник вернул {reached}")]
    SeekMismatch { requested: i64, reached: i64 },

    #[error("выходной файл уже существует: {0} (перезапись включается флагом -f)")]
    OutputExists(String),
}

impl NtfsError {
    /// Коды возврата процесса: 2 — ошибка аргументов (её выдаёт clap сам),
    /// 3 — функциональная ошибка, 4 — техническая.
    pub fn exit_code(&self) -> i32 {
        match self {
            NtfsError::UnsupportedFilesystem { .. } | NtfsError::OutputExists(_) => 3,
            _ => 4,
        }
    }
}
