//! Report output port trait.

use std::io::Write;

use crate::domain::error::ReportError;
use crate::domain::report::{Report, ReportParameters};

/// Port for rendering a generated report.
pub trait ReportSink {
    fn write(
        &self,
        report: &Report,
        parameters: &ReportParameters,
        out: &mut dyn Write,
    ) -> Result<(), ReportError>;
}
