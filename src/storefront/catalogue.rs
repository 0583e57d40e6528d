//! Catalogue browsing.
//!
//! Images are not routed here; they are streamed with
//! [`Gateway::stream_through`](crate::gateway::Gateway::stream_through) and
//! [`Endpoints::catalogue_path`].

use super::get;
use crate::config::Endpoints;
use crate::gateway::Route;
use crate::orchestrator::{OrchestrationPlan, Step};
use crate::Result;

/// Forwards a catalogue query such as `/catalogue?tags=blue&page=1`.
pub fn catalogue(endpoints: &Endpoints, path_and_query: &str) -> Result<Route> {
    let plan = OrchestrationPlan::new("catalogue")
        .then(Step::new("catalogue", get(endpoints.catalogue_path(path_and_query)?)));
    Ok(Route::with_status(plan, 200))
}

/// Lists the catalogue tags.
pub fn tags(endpoints: &Endpoints) -> Result<Route> {
    let plan = OrchestrationPlan::new("tags").then(Step::new("tags", get(endpoints.tags_url()?)));
    Ok(Route::with_status(plan, 200))
}
