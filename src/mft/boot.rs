use crate::cursor::ByteCursor;
use crate::errors::NtfsError;

/// Геометрия тома из первых 80 байт VBR (NTFS boot sector).
/// Декодер не проверяет OEM id — это делает вызывающий, чтобы отличить
/// «не NTFS» от «побитого сектора».
#[derive(Debug, Clone)]
pub struct NtfsBootSector {
    pub oem_id: String,
    pub bytes_per_sector: u16,
    pub sectors_per_cluster: u64,
    pub media_descriptor: u8,
    pub sectors_per_track: u16,
    pub number_of_heads: u16,
    pub hidden_sectors: u16,
    pub total_sectors: u64,
    pub mft_cluster: u64,
    pub mft_mirror_cluster: u64,
    pub clusters_per_file_record_segment: i8,
    pub clusters_per_index_buffer: i8,
    pub volume_serial_number: [u8; 8],
}

impl NtfsBootSector {
    pub fn parse(data: &[u8]) -> Result<Self, NtfsError> {
        if data.len() < 80 {
            return Err(NtfsError::MalformedBootSector(format!(
                "ожидалось не менее 80 байт, получено {}",
                data.len()
            )));
        }
        let r = ByteCursor::le(data);

        let bytes_per_sector = r.u16(0x0B)?;
        let spc_raw = r.u8(0x0D)? as i8;
        // Отрицательное значение кодирует степень двойки: 2^|v| секторов.
        let sectors_per_cluster = if spc_raw < 0 {
            Self::exponent(spc_raw, "sectors_per_cluster")?
        } else {
            spc_raw as u64
        };

        let clusters_per_file_record_segment = r.u8(0x40)? as i8;
        let clusters_per_index_buffer = r.u8(0x44)? as i8;
        if clusters_per_file_record_segment < 0 {
            Self::exponent(clusters_per_file_record_segment, "file_record_segment_size")?;
        }
        if clusters_per_index_buffer < 0 {
            Self::exponent(clusters_per_index_buffer, "index_buffer_size")?;
        }

        let mut volume_serial_number = [0u8; 8];
        volume_serial_number.copy_from_slice(r.slice(0x48, 8)?);

        Ok(NtfsBootSector {
            oem_id: String::from_utf8_lossy(r.slice(0x03, 8)?).into_owned(),
            bytes_per_sector,
            sectors_per_cluster,
            media_descriptor: r.u8(0x15)?,
            sectors_per_track: r.u16(0x18)?,
            number_of_heads: r.u16(0x1A)?,
            hidden_sectors: r.u16(0x1C)?,
            total_sectors: r.u64(0x28)?,
            mft_cluster: r.u64(0x30)?,
            mft_mirror_cluster: r.u64(0x38)?,
            clusters_per_file_record_segment,
            clusters_per_index_buffer,
            volume_serial_number,
        })
    }

    /// 2^|v| с отсечкой степеней больше 31: такие значения на живом томе
    /// не встречаются, а арифметика размеров обязана оставаться в u64.
    fn exponent(v: i8, field: &str) -> Result<u64, NtfsError> {
        let pow = -(v as i32);
        if pow > 31 {
            return Err(NtfsError::MalformedBootSector(format!(
                "степень двойки вне диапазона в поле {field}: {v}"
            )));
        }
        Ok(1u64 << pow as u32)
    }

    pub fn bytes_per_cluster(&self) -> u64 {
        self.bytes_per_sector as u64 * self.sectors_per_cluster
    }

    /// Размер записи MFT в байтах.
    pub fn file_record_size_bytes(&self) -> u64 {
        Self::bytes_or_clusters(self.clusters_per_file_record_segment, self.bytes_per_cluster())
    }

    /// Размер индексного буфера в байтах.
    pub fn index_buffer_size_bytes(&self) -> u64 {
        Self::bytes_or_clusters(self.clusters_per_index_buffer, self.bytes_per_cluster())
    }

    /// Положительное значение — число кластеров; отрицательное — размер 2^|v| байт.
    fn bytes_or_clusters(v: i8, bytes_per_cluster: u64) -> u64 {
        if v < 0 {
            1u64 << (-(v as i32)) as u32
        } else {
            v as u64 * bytes_per_cluster
        }
    }
}
