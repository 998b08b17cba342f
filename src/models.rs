use serde::{Deserialize, Serialize};

/// Метаданные тома, записываемые в сайдкар <дамп>.meta.json рядом с дампом.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VolumeMeta {
    pub bytes_per_sector: u16,
    pub sectors_per_cluster: u64,
    pub bytes_per_cluster: u64,
    pub mft_cluster: u64,
    pub mft_mirror_cluster: u64,
    pub mft_record_size: u64,
    pub index_buffer_size: u64,
    pub total_sectors: u64,
    pub volume_serial_number: String,
    pub source: String,
    pub dumped_bytes: i64,
}
