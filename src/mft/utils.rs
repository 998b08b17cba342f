use chrono::{DateTime, TimeZone, Utc};

/// Количество 100-нс интервалов между 1601-01-01 (эпоха FILETIME) и 1970-01-01 (Unix Epoch).
const FILETIME_UNIX_DELTA_100NS: u64 = 116_444_736_000_000_000;

/// Конвертирует Windows FILETIME (100-нс интервалы с 1601-01-01 UTC) в DateTime<Utc>.
/// Значения до 1970 года схлопываются в Unix-эпоху.
pub fn filetime_to_datetime(filetime: u64) -> DateTime<Utc> {
    let unix_time_100ns = filetime.saturating_sub(FILETIME_UNIX_DELTA_100NS);
    let seconds = (unix_time_100ns / 10_000_000) as i64;
    let nanoseconds = ((unix_time_100ns % 10_000_000) * 100) as u32;

    // Используем .single(), чтобы получить Option из LocalResult
    Utc.timestamp_opt(seconds, nanoseconds)
        .single()
        .unwrap_or_else(|| Utc.timestamp_opt(0, 0).single().unwrap())
}

/// Хекс-строка в байты; пробелы игнорируются. Только для тестовых векторов.
#[cfg(test)]
pub(crate) fn unhex(s: &str) -> Vec<u8> {
    let compact: String = s.chars().filter(|c| !c.is_whitespace()).collect();
    assert!(compact.len() % 2 == 0, "нечётное число хекс-цифр");
    compact
        .as_bytes()
        .chunks(2)
        .map(|pair| u8::from_str_radix(std::str::from_utf8(pair).unwrap(), 16).unwrap())
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::{Datelike, Timelike};

    use super::*;

    #[test]
    fn filetime_conversion() {
        // 2020-01-30 16:20:50.176398100 UTC
        let dt = filetime_to_datetime(132248748501763981);
        assert_eq!((dt.year(), dt.month(), dt.day()), (2020, 1, 30));
        assert_eq!((dt.hour(), dt.minute(), dt.second()), (16, 20, 50));
        assert_eq!(dt.timestamp_subsec_nanos(), 176_398_100);
    }

    #[test]
    fn filetime_before_unix_epoch_saturates() {
        let dt = filetime_to_datetime(0);
        assert_eq!(dt.timestamp(), 0);
    }
}
