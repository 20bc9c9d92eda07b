pub mod export;
pub mod month;
pub mod summary;

pub use export::{ExportError, ExportFormat, ExportedFile, export};
pub use month::{InvalidMonth, MonthRange, MonthlyReport, ReportStats};
pub use summary::{Summary, SummaryClient, SummaryConfig, SummaryError};
