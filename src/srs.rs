use gdal::spatial_ref::AxisMappingStrategy;
use gdal::spatial_ref::CoordTransform;
use gdal::spatial_ref::SpatialRef;
use gdal::vector::Layer;
use gdal::vector::LayerAccess;

use crate::errors::MapError;

/// The reference everything defaults to when nothing else is specified.
pub fn wgs84() -> Result<SpatialRef,MapError> {
    Ok(SpatialRef::from_epsg(4326)?)
}

/// Picks the spatial reference for an output layer: an explicit target
/// reference wins, then whatever the source layer declares, then an
/// explicit source reference. All three may be absent.
pub(crate) fn resolve_srs(explicit_target: Option<&SpatialRef>, layer: &Layer, explicit_source: Option<&SpatialRef>) -> Option<SpatialRef> {
    if let Some(srs) = explicit_target {
        Some(srs.clone())
    } else if let Some(srs) = layer.spatial_ref() {
        Some(srs)
    } else {
        explicit_source.cloned()
    }
}

/// Builds the one transformation a reprojection applies to every geometry.
pub(crate) fn coordinate_transform(source: &SpatialRef, target: &SpatialRef) -> Result<CoordTransform,MapError> {
    // GDAL 3 honors the authority's axis order for EPSG-defined references,
    // which would swap x and y for geographic data. Pin both sides to the
    // traditional order so coordinates keep meaning (x,y).
    let mut source = source.clone();
    source.set_axis_mapping_strategy(AxisMappingStrategy::TraditionalGisOrder);
    let mut target = target.clone();
    target.set_axis_mapping_strategy(AxisMappingStrategy::TraditionalGisOrder);
    Ok(CoordTransform::new(&source,&target)?)
}

#[cfg(test)]
mod test {

    use super::*;

    #[test]
    fn wgs84_is_epsg_4326() {
        let srs = wgs84().expect("Should have built the default reference.");
        assert_eq!(srs.auth_code().expect("Should have had an authority code."),4326);
    }

    #[test]
    fn identity_transform_leaves_coordinates_alone() {
        let srs = wgs84().expect("Should have built the default reference.");
        let trans = coordinate_transform(&srs,&srs).expect("Should have built a transformation.");
        let mut xs = [12.5];
        let mut ys = [-33.25];
        trans.transform_coords(&mut xs,&mut ys,&mut [0.0]).expect("Should have transformed.");
        assert!((xs[0] - 12.5).abs() < 1e-9);
        assert!((ys[0] - -33.25).abs() < 1e-9);
    }

}
