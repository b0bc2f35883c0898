use anyhow::{Result, bail};
use tracing::info;

use crate::cli::BoundaryArgs;
use crate::matching::{load_boundary, within};
use crate::model::GeoPoint;

pub fn run(args: BoundaryArgs) -> Result<()> {
    if !(-90.0..=90.0).contains(&args.lat) || !(-180.0..=180.0).contains(&args.lon) {
        bail!("coordinate out of range: ({}, {})", args.lat, args.lon);
    }

    let point = GeoPoint::new(args.lat, args.lon);
    let boundary = load_boundary(&args.boundaries_dir, &args.region_key);

    info!(
        region_key = %args.region_key,
        boundaries_dir = %args.boundaries_dir.display(),
        loaded = boundary.is_some(),
        latitude = point.latitude,
        longitude = point.longitude,
        within = within(point, boundary.as_ref()),
        "boundary check"
    );

    Ok(())
}
