//! Validate command handler

use super::load_mapping_config;
use crate::cli::ValidateArgs;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::output::OutputWriter;
use datamorph_core::validate_config;
use tracing::{info, instrument};

/// Handle the validate command
#[instrument(skip_all, fields(file = %args.mapping.display()))]
pub async fn handle_validate(
    args: ValidateArgs,
    _config: &Config,
    output: &mut OutputWriter,
) -> Result<()> {
    let mapping = load_mapping_config(&args.mapping)?;
    let report = validate_config(&mapping);

    info!(
        valid = report.valid,
        errors = report.errors.len(),
        warnings = report.warnings.len(),
        "Validated mapping configuration"
    );
    output.validation_report(&report)?;

    if report.valid {
        Ok(())
    } else {
        Err(Error::ValidationFailed {
            errors: report.errors.len(),
            unmapped: report.unmapped_required.len(),
        })
    }
}
