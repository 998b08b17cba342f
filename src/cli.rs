use clap::Parser;

const EXAMPLES: &str = r#"
ПРИМЕРЫ ИСПОЛЬЗОВАНИЯ:

  1. Снять сырую MFT с работающего диска C: в файл mft.raw:
     MFTRawCopy C: C:\MftDump\mft.raw

  2. То же с подробным выводом, перезаписью и прогресс-баром:
     MFTRawCopy -v -f -p C: C:\MftDump\mft.raw

  3. На Linux — с блочного устройства раздела:
     MFTRawCopy -v /dev/sdb1 ~/sdb1.mft

КОДЫ ВОЗВРАТА:
  0 — успех; 2 — ошибка аргументов; 3 — функциональная ошибка
  (не NTFS, выходной файл уже существует); 4 — техническая ошибка
  (ввод-вывод, повреждённые метаданные).
"#;

#[derive(Parser, Debug)]
#[command(name = "MFTRawCopy")]
#[command(version = "1.0")]
#[command(about = "DFIR tool for raw NTFS MFT extraction")]
#[command(after_help = EXAMPLES)]
pub struct Cli {
    /// Том (C: или /dev/sdb1) либо путь к raw-образу
    pub volume: String,

    /// Путь к выходному файлу дампа
    pub output: String,

    /// Подробный вывод хода работы
    #[arg(short, long)]
    pub verbose: bool,

    /// Перезаписать выходной файл, если он существует
    #[arg(short, long)]
    pub force: bool,

    /// Показывать прогресс-бар копирования
    #[arg(short, long)]
    pub progress: bool,
}
