use std::io::{self, Read, Seek, SeekFrom};

use crate::errors::NtfsError;

/// Непрерывный кусок данных на томе: абсолютное байтовое смещение от начала
/// источника и длина в байтах.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fragment {
    pub offset: i64,
    pub length: i64,
}

/// Линейный читатель поверх упорядоченного списка фрагментов и источника
/// с произвольным доступом. Фрагменты читаются строго в порядке списка; их
/// смещения могут убывать, поэтому источник обязан уметь seek назад.
///
/// Один вызов read никогда не пересекает границу фрагмента: на стыке
/// возвращается остаток текущего, следующий вызов открывает следующий.
/// Ok(0) означает конец потока и наступает только после исчерпания
/// последнего фрагмента. Ошибка позиционирования останавливает читателя
/// навсегда.
pub struct FragmentReader<R> {
    src: R,
    fragments: Vec<Fragment>,
    next_index: usize,
    remaining: i64,
    poisoned: bool,
}

impl<R: Read + Seek> FragmentReader<R> {
    pub fn new(src: R, fragments: Vec<Fragment>) -> Self {
        FragmentReader {
            src,
            fragments,
            next_index: 0,
            remaining: 0,
            poisoned: false,
        }
    }
}

impl<R: Read + Seek> Read for FragmentReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.poisoned {
            return Err(io::Error::new(
                io::ErrorKind::Other,
                "читатель фрагментов остановлен после ошибки позиционирования",
            ));
        }
        if buf.is_empty() {
            return Ok(0);
        }

        while self.remaining == 0 {
            let next = match self.fragments.get(self.next_index) {
                Some(f) => *f,
                None => return Ok(0),
            };
            self.next_index += 1;

            let reached = match self.src.seek(SeekFrom::Start(next.offset as u64)) {
                Ok(pos) => pos,
                Err(e) => {
                    self.poisoned = true;
                    return Err(e);
                }
            };
            if reached != next.offset as u64 {
                self.poisoned = true;
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    NtfsError::SeekMismatch {
                        requested: next.offset,
                        reached: reached as i64,
                    },
                ));
            }
            // отрицательная длина трактуется как пустой фрагмент
            self.remaining = next.length.max(0);
        }

        let want = (buf.len() as i64).min(self.remaining) as usize;
        self.src.read_exact(&mut buf[..want])?;
        self.remaining -= want as i64;
        Ok(want)
    }
}
