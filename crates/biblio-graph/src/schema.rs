//! Graph schema preparation (uniqueness constraints).

use biblio_core::EntityKind;
use tracing::info;

use crate::error::GraphResult;
use crate::store::GraphStore;

/// Declare the natural-key uniqueness constraint of every entity kind.
///
/// Safe to run on every sync; each declaration is idempotent. Returns the
/// number of constraints declared.
pub async fn prepare_schema<S: GraphStore + ?Sized>(store: &S) -> GraphResult<usize> {
    info!("Preparing graph schema...");

    for kind in EntityKind::ALL {
        store.ensure_constraint(kind, kind.key_property()).await?;
    }

    info!("Graph schema prepared ({} constraints)", EntityKind::ALL.len());
    Ok(EntityKind::ALL.len())
}
