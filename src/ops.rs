use std::path::Path;
use std::path::PathBuf;

use gdal::spatial_ref::SpatialRef;
use gdal::vector::Feature;
use gdal::vector::FieldValue;
use gdal::vector::Geometry;
use gdal::vector::Layer;
use gdal::vector::LayerAccess;
use gdal::vector::OGRwkbGeometryType;
use gdal::Dataset;
use gdal::DriverManager;
use gdal::vector::LayerOptions;
use ordered_float::NotNan;

use crate::errors::MapError;
use crate::gdal_ext::LayerClip;
use crate::mapper::map_layer;
use crate::mapper::prepare_target;
use crate::mapper::target_layer_name;
use crate::mapper::FeatureSelection;
use crate::mapper::NoTransform;
use crate::mapper::OUTPUT_DRIVER;
use crate::progress::ProgressObserver;
use crate::srs::coordinate_transform;
use crate::srs::wgs84;

// GDAL's own default curve approximation for buffers.
const BUFFER_SEGMENTS: u32 = 30;

// Where filtering and clipping write when the caller doesn't say. Callers
// running concurrently must pass their own disjoint targets.
const FILTER_TARGET: &str = "/vsimem/filter.shp";
const CLIP_TARGET: &str = "/vsimem/clip_out.shp";

/// Buffers every geometry of the layer by `distance` (in the layer's own
/// units) into a new dataset at `target`, attributes carried along unchanged.
pub fn buffer_layer<Progress: ProgressObserver>(source: &mut Layer, target: &Path, distance: f64, source_srs: Option<&SpatialRef>, progress: &mut Progress) -> Result<PathBuf,MapError> {
    map_layer(source,target,&FeatureSelection::All,
        Some(|geometry: &Geometry| Ok(geometry.buffer(distance,BUFFER_SEGMENTS)?)),
        source_srs,None,progress)
}

/// [`buffer_layer`], addressed by path.
pub fn buffer_dataset<Progress: ProgressObserver>(source: &Path, target: &Path, distance: f64, source_srs: Option<&SpatialRef>, progress: &mut Progress) -> Result<PathBuf,MapError> {
    let dataset = Dataset::open(source)?;
    let mut layer = dataset.layer(0)?;
    buffer_layer(&mut layer,target,distance,source_srs,progress)
}

/// Reprojects the layer into `target_srs` (the default reference when
/// unspecified). The source reference is the layer's own when it declares
/// one, then the `source_srs` argument, then the default. One coordinate
/// transformation is built up front and applied to every geometry.
pub fn reproject_layer<Progress: ProgressObserver>(source: &mut Layer, target: &Path, source_srs: Option<&SpatialRef>, target_srs: Option<&SpatialRef>, progress: &mut Progress) -> Result<PathBuf,MapError> {
    let source_ref = match source.spatial_ref() {
        Some(srs) => srs,
        None => match source_srs {
            Some(srs) => srs.clone(),
            None => wgs84()?,
        },
    };
    let target_ref = match target_srs {
        Some(srs) => srs.clone(),
        None => wgs84()?,
    };
    let trans = coordinate_transform(&source_ref,&target_ref)?;
    map_layer(source,target,&FeatureSelection::All,
        Some(|geometry: &Geometry| Ok(geometry.transform(&trans)?)),
        None,Some(&target_ref),progress)
}

/// [`reproject_layer`], addressed by path.
pub fn reproject_dataset<Progress: ProgressObserver>(source: &Path, target: &Path, source_srs: Option<&SpatialRef>, target_srs: Option<&SpatialRef>, progress: &mut Progress) -> Result<PathBuf,MapError> {
    let dataset = Dataset::open(source)?;
    let mut layer = dataset.layer(0)?;
    reproject_layer(&mut layer,target,source_srs,target_srs,progress)
}

/// How [`filter_dataset`] decides which features survive.
#[derive(Clone,Debug,PartialEq,Eq)]
pub enum FeatureFilter<'query> {
    /// keep the one feature at this 0-based offset
    ByIndex(u64),
    /// keep the features matching an attribute query, in the engine's
    /// restricted SQL WHERE syntax (without the keyword itself)
    ByPredicate(&'query str),
}

/// Copies the features selected by `filter` into a new dataset, geometry and
/// attributes unchanged. Writes to `/vsimem/filter.shp` when no target is
/// given, so short-lived filter results don't have to touch disk.
pub fn filter_dataset<Progress: ProgressObserver>(source: &Path, target: Option<&Path>, filter: &FeatureFilter, progress: &mut Progress) -> Result<PathBuf,MapError> {
    let target = target.unwrap_or_else(|| Path::new(FILTER_TARGET));
    let dataset = Dataset::open(source)?;
    let mut layer = dataset.layer(0)?;
    match filter {
        FeatureFilter::ByIndex(index) => {
            map_layer(&mut layer,target,&FeatureSelection::Index(*index),None::<NoTransform>,None,None,progress)
        },
        FeatureFilter::ByPredicate(query) => {
            // the filtered cursor is exactly what the mapper's full
            // selection walks, feature count included
            layer.set_attribute_filter(query)?;
            map_layer(&mut layer,target,&FeatureSelection::All,None::<NoTransform>,None,None,progress)
        },
    }
}

/// Clips the source layer by the shapes of the clip dataset and returns the
/// mean of `field` over the clipped features, weighted by their areas. The
/// clip shapes are first brought into the source's spatial reference through
/// an in-memory intermediate (or used as-is when the source declares no
/// reference). The clipped layer itself is written to `target`, or to
/// `/vsimem/clip_out.shp` when no target is given.
pub fn area_weighted_mean<Progress: ProgressObserver>(source: &Path, clip: &Path, field: &str, target: Option<&Path>, progress: &mut Progress) -> Result<f64,MapError> {
    let dataset = Dataset::open(source)?;
    let source_layer = dataset.layer(0)?;
    let srs = source_layer.spatial_ref();
    let target = target.unwrap_or_else(|| Path::new(CLIP_TARGET));

    // areas only weight comparably once both layers share one reference
    let clip_dataset = if let Some(srs) = &srs {
        let projected = scratch_path(target,"proj");
        _ = reproject_dataset(clip,&projected,None,Some(srs),progress)?;
        Dataset::open(projected)?
    } else {
        Dataset::open(clip)?
    };
    let clip_layer = clip_dataset.layer(0)?;

    let driver = DriverManager::get_driver_by_name(OUTPUT_DRIVER)?;
    prepare_target(&driver,target)?;
    let mut out_dataset = driver.create_vector_only(target)?;

    let mean = {
        let mut out_layer = out_dataset.create_layer(LayerOptions {
            name: &target_layer_name(target),
            srs: srs.as_ref(),
            ty: OGRwkbGeometryType::wkbUnknown,
            ..Default::default()
        })?;

        // the engine fills in the result layer's schema during the clip
        source_layer.clip_into(&clip_layer,&out_layer)?;

        let count = out_layer.feature_count();
        if count == 0 {
            return Err(MapError::NoClippedFeatures);
        }

        progress.start(|| ("Weighting clipped features.",Some(count as usize)));
        let mut weighted_sum = 0.0;
        let mut weight_sum = 0.0;
        for (i,feature) in out_layer.features().enumerate() {
            let geometry = feature.geometry().ok_or_else(|| MapError::MissingGeometry(i as u64))?;
            let area = NotNan::new(geometry.area())?;
            let value = NotNan::new(numeric_field(&feature,field)?)?;
            weighted_sum += area.into_inner() * value.into_inner();
            weight_sum += area.into_inner();
            progress.update(|| i);
        }
        progress.finish(|| "Features weighted.");

        if weight_sum <= 0.0 {
            return Err(MapError::ClippedAreaIsZero);
        }
        weighted_sum / weight_sum
    };

    out_dataset.flush_cache()?;

    Ok(mean)
}

fn numeric_field(feature: &Feature, field: &str) -> Result<f64,MapError> {
    match feature.field(field)? {
        Some(FieldValue::RealValue(value)) => Ok(value),
        Some(FieldValue::IntegerValue(value)) => Ok(f64::from(value)),
        Some(FieldValue::Integer64Value(value)) => Ok(value as f64),
        Some(_) => Err(MapError::NonNumericField(field.to_owned())),
        None => Err(MapError::MissingField(field.to_owned())),
    }
}

fn scratch_path(target: &Path, suffix: &str) -> PathBuf {
    PathBuf::from(format!("/vsimem/{}_{}.shp",target_layer_name(target),suffix))
}

#[cfg(test)]
mod test {

    use gdal::vector::OGRFieldType;

    use super::*;
    use crate::mapper::field_schema;

    fn write_point_layer(path: &str, points: &[(f64,f64,i32)]) {
        let driver = DriverManager::get_driver_by_name(OUTPUT_DRIVER).expect("Should have found the driver.");
        let mut dataset = driver.create_vector_only(path).expect("Should have created the dataset.");
        let srs = wgs84().expect("Should have built the default reference.");
        let mut layer = dataset.create_layer(LayerOptions {
            name: "source",
            srs: Some(&srs),
            ty: OGRwkbGeometryType::wkbPoint,
            ..Default::default()
        }).expect("Should have created the layer.");
        layer.create_defn_fields(&[("id",OGRFieldType::OFTInteger)]).expect("Should have created the fields.");
        for (x,y,id) in points {
            let geometry = Geometry::from_wkt(&format!("POINT ({} {})",x,y)).expect("Should have parsed the geometry.");
            layer.create_feature_fields(geometry,&["id"],&[FieldValue::IntegerValue(*id)]).expect("Should have written the feature.");
        }
        dataset.flush_cache().expect("Should have saved the dataset.");
    }

    fn write_square_layer(path: &str, field: &str, squares: &[(f64,f64,f64)]) {
        // squares are (west, east, value) over the unit band y = 0..1
        let driver = DriverManager::get_driver_by_name(OUTPUT_DRIVER).expect("Should have found the driver.");
        let mut dataset = driver.create_vector_only(path).expect("Should have created the dataset.");
        let srs = wgs84().expect("Should have built the default reference.");
        let mut layer = dataset.create_layer(LayerOptions {
            name: "source",
            srs: Some(&srs),
            ty: OGRwkbGeometryType::wkbPolygon,
            ..Default::default()
        }).expect("Should have created the layer.");
        layer.create_defn_fields(&[(field,OGRFieldType::OFTReal)]).expect("Should have created the fields.");
        for (west,east,value) in squares {
            let geometry = Geometry::from_wkt(&format!("POLYGON (({west} 0, {east} 0, {east} 1, {west} 1, {west} 0))")).expect("Should have parsed the geometry.");
            layer.create_feature_fields(geometry,&[field],&[FieldValue::RealValue(*value)]).expect("Should have written the feature.");
        }
        dataset.flush_cache().expect("Should have saved the dataset.");
    }

    fn read_features(path: &str) -> (u64,Vec<i32>,Vec<(f64,f64)>) {
        let dataset = Dataset::open(path).expect("Should have opened the output.");
        let mut layer = dataset.layer(0).expect("Should have found the layer.");
        let count = layer.feature_count();
        let mut ids = Vec::new();
        let mut points = Vec::new();
        for feature in layer.features() {
            match feature.field("id").expect("Should have read the field.") {
                Some(FieldValue::IntegerValue(id)) => ids.push(id),
                _ => panic!("The 'id' field should have been an integer."),
            }
            if let Some(geometry) = feature.geometry() {
                if geometry.geometry_type() == OGRwkbGeometryType::wkbPoint {
                    let (x,y,_) = geometry.get_point(0);
                    points.push((x,y));
                }
            }
        }
        (count,ids,points)
    }

    #[test]
    fn buffering_replaces_points_with_polygons_of_the_right_area() {
        write_point_layer("/vsimem/buffer_src.shp",&[(0.0,0.0,1),(30.0,0.0,2),(60.0,0.0,3)]);

        _ = buffer_dataset(Path::new("/vsimem/buffer_src.shp"),Path::new("/vsimem/buffer_out.shp"),10.0,None,&mut ()).expect("Should have buffered the layer.");

        let (count,ids,_) = read_features("/vsimem/buffer_out.shp");
        assert_eq!(count,3);
        assert_eq!(ids,vec![1,2,3]);

        let dataset = Dataset::open("/vsimem/buffer_out.shp").expect("Should have opened the output.");
        let mut layer = dataset.layer(0).expect("Should have found the layer.");
        for feature in layer.features() {
            let geometry = feature.geometry().expect("Should have had a geometry.");
            assert_eq!(geometry.geometry_type(),OGRwkbGeometryType::wkbPolygon);
            // a 30-segment circle approximation falls just short of PI*r^2
            assert!((geometry.area() - std::f64::consts::PI * 100.0).abs() < 1.0);
        }
    }

    #[test]
    fn identity_reprojection_changes_nothing() {
        write_point_layer("/vsimem/reproj_id_src.shp",&[(12.5,-33.25,1),(0.0,0.0,2)]);
        let srs = wgs84().expect("Should have built the default reference.");

        _ = reproject_dataset(Path::new("/vsimem/reproj_id_src.shp"),Path::new("/vsimem/reproj_id_out.shp"),None,Some(&srs),&mut ()).expect("Should have reprojected the layer.");

        let (count,ids,points) = read_features("/vsimem/reproj_id_out.shp");
        assert_eq!(count,2);
        assert_eq!(ids,vec![1,2]);
        assert!((points[0].0 - 12.5).abs() < 1e-9);
        assert!((points[0].1 - -33.25).abs() < 1e-9);

        let source_dataset = Dataset::open("/vsimem/reproj_id_src.shp").expect("Should have opened the source.");
        let source_layer = source_dataset.layer(0).expect("Should have found the layer.");
        let out_dataset = Dataset::open("/vsimem/reproj_id_out.shp").expect("Should have opened the output.");
        let out_layer = out_dataset.layer(0).expect("Should have found the layer.");
        assert_eq!(field_schema(out_layer.defn()),field_schema(source_layer.defn()));
    }

    #[test]
    fn reprojection_to_web_mercator_scales_longitude() {
        write_point_layer("/vsimem/reproj_merc_src.shp",&[(1.0,0.0,1)]);
        let mercator = SpatialRef::from_epsg(3857).expect("Should have built the target reference.");

        _ = reproject_dataset(Path::new("/vsimem/reproj_merc_src.shp"),Path::new("/vsimem/reproj_merc_out.shp"),None,Some(&mercator),&mut ()).expect("Should have reprojected the layer.");

        let (_,_,points) = read_features("/vsimem/reproj_merc_out.shp");
        // one degree of longitude on the web mercator equator
        assert!((points[0].0 - 111_319.490_793).abs() < 1.0);
        assert!(points[0].1.abs() < 1e-6);
    }

    #[test]
    fn filtering_by_predicate_keeps_matching_features() {
        write_point_layer("/vsimem/filter_pred_src.shp",&[(0.0,0.0,1),(1.0,1.0,2),(2.0,2.0,3)]);

        let target = filter_dataset(Path::new("/vsimem/filter_pred_src.shp"),Some(Path::new("/vsimem/filter_pred_out.shp")),&FeatureFilter::ByPredicate("id >= 2"),&mut ()).expect("Should have filtered the layer.");

        let (count,ids,_) = read_features(&target.to_string_lossy());
        assert_eq!(count,2);
        assert_eq!(ids,vec![2,3]);
    }

    #[test]
    fn filtering_by_index_keeps_one_feature() {
        write_point_layer("/vsimem/filter_idx_src.shp",&[(0.0,0.0,1),(1.0,1.0,2),(2.0,2.0,3)]);

        let target = filter_dataset(Path::new("/vsimem/filter_idx_src.shp"),Some(Path::new("/vsimem/filter_idx_out.shp")),&FeatureFilter::ByIndex(1),&mut ()).expect("Should have filtered the layer.");

        let (count,ids,_) = read_features(&target.to_string_lossy());
        assert_eq!(count,1);
        assert_eq!(ids,vec![2]);
    }

    #[test]
    fn weighted_mean_weights_by_clipped_area() {
        write_square_layer("/vsimem/wmean_src.shp","logk",&[(0.0,1.0,10.0),(1.0,2.0,20.0)]);
        write_square_layer("/vsimem/wmean_clip.shp","zone",&[(0.5,1.5,0.0)]);

        let mean = area_weighted_mean(Path::new("/vsimem/wmean_src.shp"),Path::new("/vsimem/wmean_clip.shp"),"logk",Some(Path::new("/vsimem/wmean_out.shp")),&mut ()).expect("Should have averaged the clipped features.");

        // half of each square survives the clip, so the weights are equal
        assert!((mean - 15.0).abs() < 1e-6);
    }

    #[test]
    fn weighted_mean_without_overlap_fails() {
        write_square_layer("/vsimem/wmean_far_src.shp","logk",&[(0.0,1.0,10.0)]);
        write_square_layer("/vsimem/wmean_far_clip.shp","zone",&[(10.0,11.0,0.0)]);

        let error = area_weighted_mean(Path::new("/vsimem/wmean_far_src.shp"),Path::new("/vsimem/wmean_far_clip.shp"),"logk",Some(Path::new("/vsimem/wmean_far_out.shp")),&mut ()).expect_err("Should have refused to average nothing.");

        assert!(matches!(error,MapError::NoClippedFeatures));
    }

}
