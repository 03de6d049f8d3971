// ABOUTME: Remove command implementation.
// ABOUTME: Detaches the update resource, optionally restoring an image first.

use super::backends;
use stacklink::config::Config;
use stacklink::diagnostics::{Diagnostics, Warning};
use stacklink::error::{Error, Result};
use stacklink::output::Output;
use stacklink::resource::{LedgerEntry, Lifecycle, MalformedRequest};
use stacklink::types::ImageRef;

/// Without `restore_image` the removal is acknowledged and nothing external is called.
pub async fn remove(config: &Config, restore_image: Option<&str>, output: &Output) -> Result<()> {
    let resource = config.update.resource_name()?;
    let ledger = backends::ledger(config);
    let mut diag = Diagnostics::default();

    let applied = match ledger.lifecycle(&resource).await? {
        Lifecycle::Applied(applied) => applied,
        Lifecycle::Absent(_) => {
            output.success(&format!("{resource} is not applied; nothing to remove"));
            return Ok(());
        }
    };

    let orphan = applied.remove();
    let record = match restore_image {
        Some(image) => {
            let image = ImageRef::parse(image).map_err(MalformedRequest::from)?;
            output.progress(&format!("Restoring {} to {image}", orphan.record().target));
            orphan
                .compensate(&backends::mutation(config), image)
                .await
                .map_err(|(_, e)| Error::from(e))?
        }
        None => {
            diag.warn(Warning::orphaned_update(format!(
                "{} keeps running {}",
                orphan.record().target,
                orphan.record().image
            )));
            orphan.acknowledge()
        }
    };

    ledger
        .save(&LedgerEntry::detached(resource.clone(), record))
        .await?;

    for warning in diag.warnings() {
        output.warning(&warning.message);
    }
    output.success(&format!("{resource} detached"));
    Ok(())
}
