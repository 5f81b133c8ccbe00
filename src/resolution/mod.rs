// src/resolution/mod.rs
pub mod geocode;
pub mod parcel;

use log::warn;

use crate::models::{Coordinate, ParcelRecord, ResolvedAddress};
pub use geocode::GeocodeClient;
pub use parcel::ParcelClient;

/// Whatever the external address sources produced for one coordinate.
/// Either side may be absent; downstream stages handle every combination.
#[derive(Debug, Clone, Default)]
pub struct AddressResolution {
    pub geocoded: Option<ResolvedAddress>,
    pub parcel: Option<ParcelRecord>,
}

/// Reverse-geocodes a coordinate and looks up its parcel, concurrently.
///
/// The two calls are independent; a failure in one does not block the other.
/// Transport failures are logged and degrade to absence of that source. An
/// unconfigured client means the source is disabled, not an error.
pub async fn resolve_address(
    geocoder: Option<&GeocodeClient>,
    parcel_service: Option<&ParcelClient>,
    coord: &Coordinate,
) -> AddressResolution {
    let geocode_fut = async {
        match geocoder {
            Some(client) => match client.reverse(coord).await {
                Ok(resolved) => resolved,
                Err(e) => {
                    warn!(
                        "Reverse geocode failed for ({}, {}): {:#}",
                        coord.latitude, coord.longitude, e
                    );
                    None
                }
            },
            None => None,
        }
    };
    let parcel_fut = async {
        match parcel_service {
            Some(client) => match client.lookup(coord).await {
                Ok(record) => record,
                Err(e) => {
                    warn!(
                        "Parcel lookup failed for ({}, {}): {:#}",
                        coord.latitude, coord.longitude, e
                    );
                    None
                }
            },
            None => None,
        }
    };

    let (geocoded, parcel) = tokio::join!(geocode_fut, parcel_fut);
    AddressResolution { geocoded, parcel }
}
