use std::fs::{File, OpenOptions};
use std::io::{self, Write};

use crate::errors::NtfsError;

/// Открывает выходной файл. По умолчанию — только создание нового;
/// с force существующий файл перезаписывается.
pub fn open_output_file(path: &str, force: bool) -> Result<File, NtfsError> {
    if force {
        return Ok(File::create(path)?);
    }
    OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(|e| {
            if e.kind() == io::ErrorKind::AlreadyExists {
                NtfsError::OutputExists(path.to_string())
            } else {
                NtfsError::Io(e)
            }
        })
}

/// Человекочитаемый размер в двоичных единицах.
pub fn format_bytes(b: i64) -> String {
    const KIB: f64 = 1024.0;
    const MIB: f64 = 1024.0 * 1024.0;
    const GIB: f64 = 1024.0 * 1024.0 * 1024.0;
    let bf = b as f64;
    if b < 1024 {
        format!("{b}B")
    } else if bf < MIB {
        format!("{:.2}KiB", bf / KIB)
    } else if bf < GIB {
        format!("{:.2}MiB", bf / MIB)
    } else {
        format!("{:.2}GiB", bf / GIB)
    }
}

/// Однострочный прогресс-бар копирования, перерисовывается через \r.
pub struct ProgressBar {
    total: i64,
    total_text: String,
}

impl ProgressBar {
    const WIDTH: usize = 50;

    pub fn new(total: i64) -> Self {
        ProgressBar {
            total,
            total_text: format_bytes(total),
        }
    }

    pub fn draw(&self, done: i64) {
        let percent = if self.total > 0 {
            done as f64 * 100.0 / self.total as f64
        } else {
            100.0
        };
        let bars = ((percent / 2.0) as usize).min(Self::WIDTH);
        print!(
            "\r[{}{}] {:6.2}% ({} / {})   ",
            "|".repeat(bars),
            " ".repeat(Self::WIDTH - bars),
            percent,
            format_bytes(done),
            self.total_text
        );
        let _ = io::stdout().flush();
    }

    pub fn finish(&self) {
        println!();
    }
}
