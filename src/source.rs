use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Instant;

use polars::prelude::*;
use rayon::prelude::*;
use tracing::{debug, info};

use crate::domain::FtvError;
use crate::view::Record;

#[derive(Debug)]
enum FileType {
    CSV,
    PARQUET,
    ARROW,
}

#[derive(Debug)]
struct FileInfo {
    path: PathBuf,
    file_size: u64,
    file_type: FileType,
}

/// A named record set loaded from disk, with every value stringified for
/// display and comparison.
#[derive(Debug)]
pub struct Source {
    pub name: String,
    pub records: Vec<Record>,
}

impl Source {
    pub fn load(path: PathBuf) -> Result<Self, FtvError> {
        let file_info = get_file_info(path)?;
        let frame = match file_info.file_type {
            FileType::CSV => load_csv(&file_info.path)?,
            FileType::PARQUET => load_parquet(&file_info.path)?,
            FileType::ARROW => load_arrow(&file_info.path)?,
        };

        // Cast each column to String in its own thread. The returned records
        // hold all data as display strings in memory.
        let start_time = Instant::now();
        let df = frame.collect()?;
        let c_: Result<Vec<(String, Vec<String>)>, _> = df
            .get_column_names()
            .par_iter()
            .map(|name| load_column(&df, name.as_str()))
            .collect();
        let columns = c_?;

        let mut records = Vec::with_capacity(df.height());
        for ridx in 0..df.height() {
            let mut record = Record::with_capacity(columns.len());
            for (name, data) in columns.iter() {
                record.insert(name.clone(), data[ridx].clone());
            }
            records.push(record);
        }

        info!(
            "Loaded {} rows x {} columns ({} bytes) in {}ms",
            records.len(),
            columns.len(),
            file_info.file_size,
            start_time.elapsed().as_millis()
        );

        let name = file_info
            .path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("???")
            .to_string();

        Ok(Source { name, records })
    }
}

fn load_column(df: &DataFrame, col_name: &str) -> Result<(String, Vec<String>), PolarsError> {
    let col = df.column(col_name)?.cast(&DataType::String)?;
    let series = col.str()?;
    let mut data = Vec::with_capacity(series.len());

    for value in series.into_iter() {
        let ss = match value {
            Some(s) => s.to_string().replace("\r\n", " ↵ ").replace("\n", " ↵ "),
            None => String::from("∅"),
        };
        data.push(ss);
    }
    debug!("Column \"{}\", # rows {}", col_name, data.len());

    Ok((col_name.to_string(), data))
}

fn detect_file_type(path: &Path) -> Result<FileType, FtvError> {
    match path
        .extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_uppercase())
        .as_deref()
    {
        Some("CSV") => Ok(FileType::CSV),
        Some("PARQUET") | Some("PQ") => Ok(FileType::PARQUET),
        Some("ARROW") | Some("IPC") | Some("FEATHER") => Ok(FileType::ARROW),
        _ => Err(FtvError::UnknownFileType),
    }
}

fn get_file_info(path: PathBuf) -> Result<FileInfo, FtvError> {
    let metadata = fs::metadata(&path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => FtvError::FileNotFound,
        ErrorKind::PermissionDenied => FtvError::PermissionDenied,
        _ => FtvError::IoError(e),
    })?;
    if !metadata.is_file() {
        return Err(FtvError::LoadingFailed("Not a file!".into()));
    }

    let file_size = metadata.len();
    let file_type = detect_file_type(&path)?;

    Ok(FileInfo {
        path,
        file_size,
        file_type,
    })
}

fn load_csv(path: &PathBuf) -> Result<LazyFrame, PolarsError> {
    LazyCsvReader::new(PlPath::Local(path.as_path().into()))
        .with_has_header(true)
        .finish()
}

fn load_parquet(path: &PathBuf) -> Result<LazyFrame, PolarsError> {
    LazyFrame::scan_parquet(
        PlPath::Local(path.as_path().into()),
        ScanArgsParquet::default(),
    )
}

fn load_arrow(path: &PathBuf) -> Result<LazyFrame, PolarsError> {
    LazyFrame::scan_ipc(
        PlPath::Local(path.as_path().into()),
        polars::io::ipc::IpcScanOptions,
        UnifiedScanArgs::default(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn csv_round_trips_into_records() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, "name,age").unwrap();
        writeln!(file, "Alice,30").unwrap();
        writeln!(file, "Bob,41").unwrap();
        file.flush().unwrap();

        let source = Source::load(file.path().to_path_buf()).unwrap();
        assert_eq!(source.records.len(), 2);
        // numbers are coerced to display strings
        assert_eq!(source.records[0]["name"], "Alice");
        assert_eq!(source.records[0]["age"], "30");
        // the first record's keys define the column order
        let keys: Vec<&str> = source.records[0].keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["name", "age"]);
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let file = tempfile::Builder::new().suffix(".xyz").tempfile().unwrap();
        let err = Source::load(file.path().to_path_buf()).unwrap_err();
        assert!(matches!(err, FtvError::UnknownFileType));
    }

    #[test]
    fn missing_file_is_reported() {
        let err = Source::load(PathBuf::from("/no/such/file.csv")).unwrap_err();
        assert!(matches!(err, FtvError::FileNotFound));
    }
}
