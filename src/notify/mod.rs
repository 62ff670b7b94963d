pub mod dispatcher;
pub mod report;
pub mod sink;

pub use dispatcher::{ReportDispatcher, RetryPolicy, SkipReason};
pub use report::{ReportBundle, Tier};
pub use sink::{HttpReportSink, ReportSink};
