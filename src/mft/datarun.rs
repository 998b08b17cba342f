use crate::cursor::ByteCursor;
use crate::errors::NtfsError;
use crate::fragment::Fragment;

/// Один data run нерезидентного атрибута: длина в кластерах и смещение
/// в кластерах со знаком. Смещение задано относительно предыдущего run;
/// у первого run оно отсчитывается от начала тома.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataRun {
    pub offset_cluster: i64,
    pub length_in_clusters: u64,
}

/// Разбирает закодированный список data runs. Первый байт каждого run —
/// заголовок: младший ниббл задаёт ширину поля длины, старший — ширину поля
/// смещения. Нулевой заголовок завершает список. Ширина поля не бывает
/// больше 8 байт; run, не помещающийся в остаток буфера, — повреждение.
pub fn parse_data_runs(mut b: &[u8]) -> Result<Vec<DataRun>, NtfsError> {
    let mut runs = Vec::new();
    while !b.is_empty() {
        let r = ByteCursor::le(b);
        let header = r.u8(0)?;
        if header == 0 {
            break;
        }

        let length_len = (header & 0x0F) as usize;
        let offset_len = (header >> 4) as usize;
        if length_len > 8 || offset_len > 8 {
            return Err(NtfsError::MalformedDataRun(format!(
                "ширина поля больше 8 байт: длина {length_len}, смещение {offset_len}"
            )));
        }

        let total = 1 + length_len + offset_len;
        if b.len() < total {
            return Err(NtfsError::MalformedDataRun(format!(
                "нужно {total} байт на run, осталось {}",
                b.len()
            )));
        }

        // Длина — без знака, смещение — со знаком; одно и то же чтение
        // переменной ширины, различается только расширение старших байт.
        // Нулевая ширина смещения — разреженный run: кластер не назначен,
        // дельта остаётся нулевой.
        let length_in_clusters = r.uint(1, length_len)?;
        let offset_cluster = r.int(1 + length_len, offset_len)?;

        runs.push(DataRun {
            offset_cluster,
            length_in_clusters,
        });
        b = &b[total..];
    }
    Ok(runs)
}

/// Переводит относительные кластерные runs в абсолютные байтовые фрагменты
/// тома: бегущая сумма дельт умножается на размер кластера. Чистое
/// преобразование без ошибок; порядок сохраняется, смещения на выходе могут
/// убывать. Арифметика — в дополнительном коде с заворачиванием.
pub fn data_runs_to_fragments(runs: &[DataRun], bytes_per_cluster: u64) -> Vec<Fragment> {
    let bpc = bytes_per_cluster as i64;
    let mut fragments = Vec::with_capacity(runs.len());
    let mut previous_cluster: i64 = 0;
    for run in runs {
        let absolute_cluster = previous_cluster.wrapping_add(run.offset_cluster);
        fragments.push(Fragment {
            offset: absolute_cluster.wrapping_mul(bpc),
            length: (run.length_in_clusters as i64).wrapping_mul(bpc),
        });
        previous_cluster = absolute_cluster;
    }
    fragments
}

#[cfg(test)]
mod tests {
    use crate::mft::utils::unhex;

    use super::*;

    #[test]
    fn parses_captured_run_list() {
        let b = unhex(
            "3320c80000000c42e061a4b54507330dc8006fedb142365db3d8\
             9cfb32802b3a045b433d830054029301000000000000",
        );
        let runs = parse_data_runs(&b).unwrap();

        let expected = [
            DataRun { offset_cluster: 786432, length_in_clusters: 51232 },
            DataRun { offset_cluster: 122008996, length_in_clusters: 25056 },
            DataRun { offset_cluster: -5116561, length_in_clusters: 51213 },
            DataRun { offset_cluster: -73606989, length_in_clusters: 23862 },
            DataRun { offset_cluster: 5964858, length_in_clusters: 11136 },
            DataRun { offset_cluster: 26411604, length_in_clusters: 33597 },
        ];
        assert_eq!(runs, expected);
    }

    #[test]
    fn empty_input_and_terminator() {
        assert!(parse_data_runs(&[]).unwrap().is_empty());
        assert!(parse_data_runs(&[0x00]).unwrap().is_empty());

        // данные за нулевым заголовком не читаются
        let runs = parse_data_runs(&[0x11, 0x02, 0x05, 0x00, 0xAB, 0xCD]).unwrap();
        assert_eq!(
            runs,
            [DataRun { offset_cluster: 5, length_in_clusters: 2 }]
        );
    }

    #[test]
    fn sparse_run_has_zero_offset() {
        // ширина смещения 0: кластер не назначен
        let runs = parse_data_runs(&[0x01, 0x08, 0x00]).unwrap();
        assert_eq!(
            runs,
            [DataRun { offset_cluster: 0, length_in_clusters: 8 }]
        );
    }

    #[test]
    fn negative_delta_is_sign_extended() {
        // смещение F0 = -16 при ширине 1
        let runs = parse_data_runs(&[0x11, 0x04, 0xF0, 0x00]).unwrap();
        assert_eq!(runs[0].offset_cluster, -16);
        assert_eq!(runs[0].length_in_clusters, 4);
    }

    #[test]
    fn truncated_run_is_malformed() {
        assert!(matches!(
            parse_data_runs(&[0x21, 0x04]),
            Err(NtfsError::MalformedDataRun(_))
        ));
        assert!(matches!(
            parse_data_runs(&[0x44, 0x01, 0x02, 0x03, 0x04, 0x05]),
            Err(NtfsError::MalformedDataRun(_))
        ));
    }

    #[test]
    fn oversized_nibble_is_malformed() {
        // младший ниббл 0xF: поле длины шире 8 байт
        let mut b = vec![0x0F];
        b.extend_from_slice(&[0u8; 32]);
        assert!(matches!(
            parse_data_runs(&b),
            Err(NtfsError::MalformedDataRun(_))
        ));
        // старший ниббл 0x9: поле смещения шире 8 байт
        let mut b = vec![0x91];
        b.extend_from_slice(&[0u8; 32]);
        assert!(matches!(
            parse_data_runs(&b),
            Err(NtfsError::MalformedDataRun(_))
        ));
    }

    #[test]
    fn runs_to_fragments_scenario() {
        let runs = [
            DataRun { offset_cluster: 5521, length_in_clusters: 1337 },
            DataRun { offset_cluster: -4408, length_in_clusters: 42 },
            DataRun { offset_cluster: 7708, length_in_clusters: 13 },
        ];
        let fragments = data_runs_to_fragments(&runs, 512);
        assert_eq!(
            fragments,
            [
                Fragment { offset: 2826752, length: 684544 },
                Fragment { offset: 569856, length: 21504 },
                Fragment { offset: 4516352, length: 6656 },
            ]
        );
    }

    #[test]
    fn fragment_invariants_hold() {
        let b = unhex(
            "3320c80000000c42e061a4b54507330dc8006fedb142365db3d8\
             9cfb32802b3a045b433d830054029301000000000000",
        );
        let runs = parse_data_runs(&b).unwrap();
        let bpc = 4096u64;
        let fragments = data_runs_to_fragments(&runs, bpc);

        let total_clusters: u64 = runs.iter().map(|r| r.length_in_clusters).sum();
        let total_bytes: i64 = fragments.iter().map(|f| f.length).sum();
        assert_eq!(total_bytes as u64, total_clusters * bpc);

        assert_eq!(fragments[0].offset, runs[0].offset_cluster * bpc as i64);
        for i in 1..fragments.len() {
            // рекуррентность по смещению фрагмента, не по кластеру
            assert_eq!(
                fragments[i].offset,
                fragments[i - 1].offset + runs[i].offset_cluster * bpc as i64
            );
        }
    }

    #[test]
    fn mapping_preserves_order_even_non_monotonic() {
        let runs = [
            DataRun { offset_cluster: 100, length_in_clusters: 1 },
            DataRun { offset_cluster: -50, length_in_clusters: 1 },
            DataRun { offset_cluster: 10, length_in_clusters: 1 },
        ];
        let f = data_runs_to_fragments(&runs, 2);
        assert_eq!(f[0].offset, 200);
        assert_eq!(f[1].offset, 100);
        assert_eq!(f[2].offset, 120);
    }
}
