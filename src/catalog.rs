//! Reference catalog gate: guards that a code used in a domain payload
//! (pause reason, cancellation reason, completion symptom/cause/action)
//! names an active entry in `ref_catalog_items`.

use thiserror::Error;

use crate::projections::ProjectionStore;

#[derive(Debug, Error)]
pub enum Error {
    #[error("catalog lookup failed: {0}")]
    Lookup(#[from] anyhow::Error),
}

pub fn require_active_code(
    store: &dyn ProjectionStore,
    catalog: &str,
    code: &str,
) -> Result<bool, Error> {
    Ok(store.ref_code_exists(catalog, code)?)
}
