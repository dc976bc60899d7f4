/// Settings for a provisioning run.
#[derive(Debug, Clone)]
pub struct ProvisionSettings {
    /// Simulate creation: reads still go through the gateway, writes never
    /// do, and every would-be-created record gets a synthetic id.
    pub dry_run: bool,

    /// Leave created orders in place when a run fails instead of archiving
    /// them.
    pub skip_auto_archive: bool,
}

impl Default for ProvisionSettings {
    fn default() -> Self {
        Self {
            dry_run: true,
            skip_auto_archive: false,
        }
    }
}
