/// 数据集解析与校验错误，任何一种都会中止整次导入
#[derive(thiserror::Error, Debug)]
pub enum DatasetError {
    #[error("file is too large: {actual_mib:.2} MiB exceeds the maximum of {max_mib:.2} MiB")]
    FileTooLarge { actual_mib: f64, max_mib: f64 },
    #[error("file is not valid UTF-8 text")]
    InvalidEncoding,
    #[error("invalid JSON: {0}")]
    InvalidJson(String),
    #[error("expected array or object at the JSON top level, found {0}")]
    UnexpectedJsonShape(&'static str),
    #[error("JSON entry {index} is not an object")]
    JsonEntryNotObject { index: usize },
    #[error("CSV must contain a header row and at least one data row")]
    CsvTooShort,
    #[error("CSV error: {0}")]
    Csv(String),
    #[error("header row is empty")]
    EmptyHeaderRow,
    #[error("header in column {column} is empty")]
    EmptyHeader { column: usize },
    #[error("duplicate header \"{0}\"")]
    DuplicateHeader(String),
    #[error("header in column {column} is {len} characters long, the maximum is {max}")]
    HeaderTooLong { column: usize, len: usize, max: usize },
    #[error("row {row} has {actual} columns but the header has {expected}")]
    ColumnCountMismatch {
        row: usize,
        actual: usize,
        expected: usize,
    },
    #[error("too many records: {actual} exceeds the maximum of {max}")]
    TooManyRecords { actual: usize, max: usize },
    #[error("spreadsheet error: {0}")]
    Spreadsheet(String),
    #[error("workbook contains no sheets")]
    NoSheets,
    #[error("sheet \"{0}\" contains no data rows")]
    EmptySheet(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
