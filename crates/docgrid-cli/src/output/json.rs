use docgrid_core::error::DocgridError;
use docgrid_core::BatchReport;

pub fn print(report: &BatchReport) -> Result<(), DocgridError> {
    let json = serde_json::to_string_pretty(report)?;
    println!("{json}");
    Ok(())
}
