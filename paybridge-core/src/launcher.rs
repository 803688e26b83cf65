//! Opens the external redirect for sources that need one.

use crate::config::ErrorCatalog;
use crate::error::{ErrorKind, PayBridgeResult};
use crate::platform::RedirectSurface;
use crate::registry::{CreatedSource, Occupied, SourceRegistry};
use crate::resolver::Settlement;
use crate::source::Source;

pub(crate) enum Launch {
    /// No redirect needed; resolve with the snapshot right away.
    Immediate(Source),
    /// The browser is open; the settlement completes once the redirect is resolved.
    Redirecting {
        source_id: String,
        settlement: Settlement,
    },
}

/// Launches the redirect for `source`.
///
/// The pending request is registered before the browser opens, so a return
/// event racing the launch always finds it. When no display surface is
/// available the source stays recorded for a later `complete_redirect_flow`.
pub(crate) fn launch(
    registry: &SourceRegistry,
    surface: &dyn RedirectSurface,
    catalog: &ErrorCatalog,
    source: CreatedSource,
) -> PayBridgeResult<Launch> {
    if !source.snapshot().requires_redirect() {
        log::info!(
            "source {} uses the {} flow, no redirect needed",
            source.id(),
            source.snapshot().flow
        );
        return Ok(Launch::Immediate(source.into_source()));
    }

    let Some(url) = source.snapshot().redirect_url.clone() else {
        log::warn!("source {} has a redirect flow but no redirect url", source.id());
        return Err(catalog.rejection(ErrorKind::RedirectFailed));
    };

    if !surface.is_available() {
        log::warn!("no foreground surface to open the redirect for source {}", source.id());
        if registry.record_created(source).is_err() {
            log::debug!("another redirect is in flight, dropping the created source");
        }
        return Err(catalog.rejection(ErrorKind::ActivityUnavailable));
    }

    let source_id = source.id().to_string();
    let settlement = registry
        .arm(source)
        .map_err(|Occupied| catalog.rejection(ErrorKind::RequestInProgress))?;

    log::info!("opening redirect for source {source_id}");
    if let Err(error) = surface.open_url(url) {
        log::warn!("failed to open redirect for source {source_id}: {error}");
        if let Some(in_flight) = registry.take_in_flight(&source_id) {
            in_flight
                .pending
                .reject(catalog.rejection(ErrorKind::ActivityUnavailable));
        }
    }

    Ok(Launch::Redirecting {
        source_id,
        settlement,
    })
}
