use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::time::Instant;

use crate::cli::Cli;
use crate::errors::NtfsError;
use crate::fragment::FragmentReader;
use crate::mft::attribute::AttributeType;
use crate::mft::attributes::{parse_attribute_list, FileName, StandardInformation};
use crate::mft::boot::NtfsBootSector;
use crate::mft::datarun::{data_runs_to_fragments, parse_data_runs};
use crate::mft::record::MftRecord;
use crate::models::VolumeMeta;
use crate::output::{format_bytes, open_output_file, ProgressBar};

/// OEM id, с которым конвейер согласен работать.
const SUPPORTED_OEM_ID: &str = "NTFS    ";
/// Буфер копирования.
const COPY_CHUNK: usize = 1024 * 1024;
/// Размер загрузочного сектора.
const BOOT_SECTOR_SIZE: usize = 512;

/// Конвейер дампа: загрузочный сектор → запись $MFT → единственный
/// нерезидентный $DATA → data runs → фрагменты → поток в выходной файл.
/// Том открывается только на чтение и никогда не модифицируется.
pub fn run(cli: &Cli) -> Result<(), NtfsError> {
    let started = Instant::now();
    let volume_path = normalize_volume_path(&cli.volume);

    println!("[*] Запуск дампа MFT");
    println!(" -> Источник: {}", volume_path);
    println!(" -> Выходной файл: {}", cli.output);

    let mut volume = File::open(&volume_path)?;

    if cli.verbose {
        println!("[v] Читаем загрузочный сектор ({BOOT_SECTOR_SIZE} байт)");
    }
    let mut boot_data = [0u8; BOOT_SECTOR_SIZE];
    volume.read_exact(&mut boot_data)?;

    let boot = NtfsBootSector::parse(&boot_data)?;
    if boot.oem_id != SUPPORTED_OEM_ID {
        return Err(NtfsError::UnsupportedFilesystem {
            found: boot.oem_id.clone(),
            expected: SUPPORTED_OEM_ID,
        });
    }

    let bytes_per_cluster = boot.bytes_per_cluster();
    let record_size = boot.file_record_size_bytes();
    if bytes_per_cluster == 0 || record_size < 42 {
        return Err(NtfsError::MalformedBootSector(format!(
            "непригодная геометрия: кластер {bytes_per_cluster} байт, запись {record_size} байт"
        )));
    }
    let mft_offset = boot
        .mft_cluster
        .checked_mul(bytes_per_cluster)
        .ok_or_else(|| {
            NtfsError::MalformedBootSector("переполнение при вычислении смещения $MFT".into())
        })?;

    if cli.verbose {
        println!("[v] bytes_per_sector: {}", boot.bytes_per_sector);
        println!("[v] sectors_per_cluster: {}", boot.sectors_per_cluster);
        println!("[v] bytes_per_cluster: {bytes_per_cluster}");
        println!("[v] Размер записи MFT: {record_size} байт");
        println!(
            "[v] $MFT в кластере {} (смещение {mft_offset} байт)",
            boot.mft_cluster
        );
    }

    volume.seek(SeekFrom::Start(mft_offset))?;
    let mut record_data = vec![0u8; record_size as usize];
    volume.read_exact(&mut record_data)?;

    if cli.verbose {
        println!("[v] Разбираем запись $MFT");
    }
    let record = MftRecord::parse(&record_data)?;
    if cli.verbose {
        print_record_details(&record);
    }

    let data_attributes = record.find_attributes(AttributeType::DATA);
    if data_attributes.is_empty() {
        return Err(NtfsError::UnsupportedAttribute(
            "в записи $MFT нет атрибута $DATA".into(),
        ));
    }
    if data_attributes.len() > 1 {
        return Err(NtfsError::UnsupportedAttribute(format!(
            "в записи $MFT найдено {} атрибутов $DATA, ожидался один",
            data_attributes.len()
        )));
    }
    let data_attribute = data_attributes[0];
    if data_attribute.resident {
        return Err(NtfsError::UnsupportedAttribute(
            "резидентный $DATA в записи $MFT не поддерживается".into(),
        ));
    }

    let runs = parse_data_runs(&data_attribute.data)?;
    if runs.is_empty() {
        return Err(NtfsError::UnsupportedAttribute(
            "$DATA записи $MFT не содержит ни одного data run".into(),
        ));
    }
    let fragments = data_runs_to_fragments(&runs, bytes_per_cluster);
    let total_length: i64 = fragments.iter().map(|f| f.length).sum();

    if cli.verbose {
        println!(
            "[v] Data runs: {}, фрагментов: {}, заявленный размер $DATA: {} байт",
            runs.len(),
            fragments.len(),
            data_attribute.actual_size
        );
    }

    let mut out = open_output_file(&cli.output, cli.force)?;

    println!(
        "[*] Копируем {} ({} байт) в {}",
        format_bytes(total_length),
        total_length,
        cli.output
    );
    let mut reader = FragmentReader::new(&mut volume, fragments);
    let copied = copy_stream(&mut reader, &mut out, total_length, cli.progress)?;

    if copied != total_length {
        return Err(NtfsError::Io(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            format!("скопировано {copied} байт вместо {total_length}"),
        )));
    }

    write_meta_sidecar(&cli.output, &volume_path, &boot, copied);

    println!(
        "[+] Готово: {} за {:.2?}",
        format_bytes(copied),
        started.elapsed()
    );
    Ok(())
}

/// Копирует поток кусками по COPY_CHUNK, по желанию рисуя прогресс-бар.
fn copy_stream(
    src: &mut impl Read,
    dst: &mut impl Write,
    total: i64,
    progress: bool,
) -> Result<i64, NtfsError> {
    let mut buf = vec![0u8; COPY_CHUNK];
    let mut written: i64 = 0;
    let bar = if progress {
        Some(ProgressBar::new(total))
    } else {
        None
    };

    loop {
        if let Some(bar) = bar.as_ref() {
            bar.draw(written);
        }
        let n = src.read(&mut buf)?;
        if n == 0 {
            break;
        }
        dst.write_all(&buf[..n])?;
        written += n as i64;
    }

    if let Some(bar) = bar.as_ref() {
        bar.draw(written);
        bar.finish();
    }
    Ok(written)
}

/// Подробности записи $MFT в режиме -v: штампы времени, имя и сырые записи
/// $ATTRIBUTE_LIST. Расширения по списку атрибутов не собираются — только
/// показываются.
fn print_record_details(record: &MftRecord) {
    let h = &record.header;
    println!(
        "[v] Запись #{}: seq {}, жёстких ссылок {}, атрибутов {}",
        h.record_number,
        h.sequence_number,
        h.hard_link_count,
        record.attributes.len()
    );

    for attr in record.find_attributes(AttributeType::STANDARD_INFORMATION) {
        match StandardInformation::parse(&attr.data) {
            Ok(si) => println!(
                "[v] $STANDARD_INFORMATION: создана {}, изменена {}, флаги {:#x}",
                si.creation_time, si.file_last_modified, si.file_attributes.0
            ),
            Err(e) => println!("[v] $STANDARD_INFORMATION не разобран: {e}"),
        }
    }

    for attr in record.find_attributes(AttributeType::FILE_NAME) {
        match FileName::parse(&attr.data) {
            Ok(fname) => println!(
                "[v] $FILE_NAME: {:?} (родительская запись #{})",
                fname.name, fname.parent_file_reference.record_number
            ),
            Err(e) => println!("[v] $FILE_NAME не разобран: {e}"),
        }
    }

    for attr in record.find_attributes(AttributeType::ATTRIBUTE_LIST) {
        if !attr.resident {
            println!("[v] $ATTRIBUTE_LIST нерезидентный; записи-расширения не читаем");
            continue;
        }
        match parse_attribute_list(&attr.data) {
            Ok(entries) => {
                println!(
                    "[v] $ATTRIBUTE_LIST: {} записей (расширения не собираются):",
                    entries.len()
                );
                for e in &entries {
                    println!(
                        "      тип {:#x} ({}), VCN {}, база #{}/{}",
                        e.attr_type.0,
                        e.attr_type.name(),
                        e.starting_vcn,
                        e.base_record_reference.record_number,
                        e.base_record_reference.sequence_number
                    );
                }
            }
            Err(e) => println!("[v] $ATTRIBUTE_LIST не разобран: {e}"),
        }
    }
}

/// "C:" разворачиваем в путь устройства \\.\C: — так на Windows открываются
/// тома целиком. Остальные пути идут как есть.
fn normalize_volume_path(volume: &str) -> String {
    let looks_like_drive = volume.len() >= 2
        && volume.len() <= 3
        && volume.as_bytes()[0].is_ascii_alphabetic()
        && volume.as_bytes()[1] == b':';
    if cfg!(windows) && looks_like_drive {
        format!("\\\\.\\{}", &volume[0..2])
    } else {
        volume.to_string()
    }
}

/// Сайдкар с геометрией тома рядом с дампом. Не критичен для результата,
/// поэтому ошибки записи молча игнорируются.
fn write_meta_sidecar(output: &str, source: &str, boot: &NtfsBootSector, dumped_bytes: i64) {
    let meta = VolumeMeta {
        bytes_per_sector: boot.bytes_per_sector,
        sectors_per_cluster: boot.sectors_per_cluster,
        bytes_per_cluster: boot.bytes_per_cluster(),
        mft_cluster: boot.mft_cluster,
        mft_mirror_cluster: boot.mft_mirror_cluster,
        mft_record_size: boot.file_record_size_bytes(),
        index_buffer_size: boot.index_buffer_size_bytes(),
        total_sectors: boot.total_sectors,
        volume_serial_number: format!("{:016X}", u64::from_le_bytes(boot.volume_serial_number)),
        source: source.to_string(),
        dumped_bytes,
    };
    if let Ok(mut f) = File::create(format!("{output}.meta.json")) {
        let _ = serde_json::to_writer_pretty(&mut f, &meta);
        let _ = f.write_all(b"\n");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn volume_path_normalization() {
        if cfg!(windows) {
            assert_eq!(normalize_volume_path("C:"), "\\\\.\\C:");
            assert_eq!(normalize_volume_path("d:\\"), "\\\\.\\d:");
        } else {
            assert_eq!(normalize_volume_path("C:"), "C:");
        }
        assert_eq!(normalize_volume_path("/dev/sdb1"), "/dev/sdb1");
        assert_eq!(
            normalize_volume_path("C:\\images\\vol.raw"),
            "C:\\images\\vol.raw"
        );
    }

    #[test]
    fn copy_stream_counts_bytes() {
        let data: Vec<u8> = (0..100000u32).map(|i| (i % 256) as u8).collect();
        let mut src = &data[..];
        let mut dst = Vec::new();
        let n = copy_stream(&mut src, &mut dst, data.len() as i64, false).unwrap();
        assert_eq!(n, data.len() as i64);
        assert_eq!(dst, data);
    }
}
