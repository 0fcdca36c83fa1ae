use std::fs;
use std::path::Path;
use std::path::PathBuf;

use gdal::spatial_ref::SpatialRef;
use gdal::vector::Defn;
use gdal::vector::Feature;
use gdal::vector::FieldDefn;
use gdal::vector::Geometry;
use gdal::vector::Layer;
use gdal::vector::LayerAccess;
use gdal::vector::OGRFieldType;
use gdal::vector::OGRwkbGeometryType;
use gdal::Dataset;
use gdal::Driver;
use gdal::DriverManager;
use gdal::vector::LayerOptions;
use indexmap::IndexMap;

use crate::errors::GdalError;
use crate::errors::MapError;
use crate::gdal_ext::DriverDelete;
use crate::progress::ProgressObserver;
use crate::srs::resolve_srs;

pub(crate) const OUTPUT_DRIVER: &str = "ESRI Shapefile";

/// Which features of the source layer take part in a mapping.
#[derive(Clone,Debug,PartialEq,Eq)]
pub enum FeatureSelection {
    /// every feature, in cursor order
    All,
    /// one feature, addressed by its 0-based offset in cursor order
    Index(u64),
}

/// Convenience alias for call sites that pass `None` as the transform.
pub type NoTransform = fn(&Geometry) -> Result<Geometry,MapError>;

/// One field of a layer schema, keyed by its name in [`field_schema`].
#[derive(Clone,Debug,PartialEq,Eq)]
pub struct FieldSpec {
    pub field_type: OGRFieldType::Type,
    pub width: i32,
    pub precision: i32,
}

/// Snapshots a layer definition as an ordered name-to-field map. The mapper
/// copies schemas through this, so attribute values are always written back
/// by name rather than by position.
pub fn field_schema(defn: &Defn) -> IndexMap<String,FieldSpec> {
    defn.fields().map(|field| {
        (field.name(),FieldSpec {
            field_type: field.field_type(),
            width: field.width(),
            precision: field.precision(),
        })
    }).collect()
}

/// Copies a feature layer into a freshly created dataset, running every
/// selected feature's geometry through `transform` on the way (or copying it
/// unchanged when there is no transform). The output layer gets a
/// field-for-field copy of the source schema before any feature is written,
/// and its spatial reference follows the precedence: explicit `target_srs`,
/// then the source layer's own reference, then explicit `source_srs`.
///
/// Anything already present at `target` is deleted first; mapping overwrites,
/// it never merges. On error the target is left partially written and is the
/// caller's to discard.
pub fn map_layer<Transform: FnMut(&Geometry) -> Result<Geometry,MapError>, Progress: ProgressObserver>(
    source: &mut Layer,
    target: &Path,
    selection: &FeatureSelection,
    mut transform: Option<Transform>,
    source_srs: Option<&SpatialRef>,
    target_srs: Option<&SpatialRef>,
    progress: &mut Progress,
) -> Result<PathBuf,MapError> {

    let target_srs = resolve_srs(target_srs,source,source_srs);

    let driver = DriverManager::get_driver_by_name(OUTPUT_DRIVER)?;
    prepare_target(&driver,target)?;
    let mut dataset = driver.create_vector_only(target)?;

    {
        let target_layer = dataset.create_layer(LayerOptions {
            name: &target_layer_name(target),
            srs: target_srs.as_ref(),
            ty: OGRwkbGeometryType::wkbUnknown,
            ..Default::default()
        })?;

        let schema = field_schema(source.defn());
        for (name,spec) in &schema {
            create_field(name,spec,&target_layer).map_err(|error| MapError::FieldNotCopied{field: name.clone(), error})?;
        }

        let defn = Defn::from_layer(&target_layer);
        let count = source.feature_count();

        match selection {
            FeatureSelection::All => {
                progress.start(|| ("Mapping features.",Some(count as usize)));
                for (i,feature) in source.features().enumerate() {
                    write_mapped(&feature,i as u64,&defn,&target_layer,&schema,&mut transform)?;
                    progress.update(|| i);
                }
                progress.finish(|| "Features mapped.");
            },
            FeatureSelection::Index(index) => {
                progress.start(|| ("Mapping features.",Some(1)));
                let feature = source.features().nth(*index as usize).ok_or(MapError::FeatureIndexOutOfRange{index: *index, count})?;
                write_mapped(&feature,*index,&defn,&target_layer,&schema,&mut transform)?;
                progress.finish(|| "Features mapped.");
            },
        }
    }

    progress.start_unknown_endpoint(|| "Saving layer.");
    dataset.flush_cache()?;
    progress.finish(|| "Layer saved.");

    Ok(target.to_path_buf())
}

/// The same mapping, addressed by path: opens the first layer of the dataset
/// at `source` and hands it to [`map_layer`].
pub fn map_dataset<Transform: FnMut(&Geometry) -> Result<Geometry,MapError>, Progress: ProgressObserver>(
    source: &Path,
    target: &Path,
    selection: &FeatureSelection,
    transform: Option<Transform>,
    source_srs: Option<&SpatialRef>,
    target_srs: Option<&SpatialRef>,
    progress: &mut Progress,
) -> Result<PathBuf,MapError> {
    let dataset = Dataset::open(source)?;
    let mut layer = dataset.layer(0)?;
    map_layer(&mut layer,target,selection,transform,source_srs,target_srs,progress)
}

pub(crate) fn prepare_target(driver: &Driver, target: &Path) -> Result<(),MapError> {
    // the virtual filesystem has no directories to create
    if !target.to_string_lossy().starts_with("/vsi") {
        if let Some(parent) = target.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).map_err(|error| MapError::OutputDirectory{path: parent.to_path_buf(), error})?;
            }
        }
    }
    // probing with an open treats real and virtual paths the same way, and
    // deleting through the driver takes the sidecar files along
    if Dataset::open(target).is_ok() {
        driver.delete_dataset(target)?;
    }
    Ok(())
}

pub(crate) fn target_layer_name(target: &Path) -> String {
    target.file_stem().map(|stem| stem.to_string_lossy().into_owned()).unwrap_or_else(|| "layer".to_owned())
}

fn create_field(name: &str, spec: &FieldSpec, target: &Layer) -> Result<(),GdalError> {
    let field = FieldDefn::new(name,spec.field_type)?;
    field.set_width(spec.width);
    field.set_precision(spec.precision);
    field.add_to_layer(target)
}

fn write_mapped<Transform: FnMut(&Geometry) -> Result<Geometry,MapError>>(
    source: &Feature,
    offset: u64,
    defn: &Defn,
    target: &Layer,
    schema: &IndexMap<String,FieldSpec>,
    transform: &mut Option<Transform>,
) -> Result<(),MapError> {
    let mut mapped = Feature::new(defn)?;
    match (source.geometry(),transform.as_mut()) {
        (Some(geometry),Some(func)) => mapped.set_geometry(func(geometry)?)?,
        (Some(geometry),None) => mapped.set_geometry(geometry.clone())?,
        (None,Some(_)) => return Err(MapError::MissingGeometry(offset)),
        // a record with no geometry is copied as attributes only
        (None,None) => (),
    }
    for name in schema.keys() {
        if let Some(value) = source.field(name)? {
            mapped.set_field(name,&value)?;
        }
    }
    mapped.create(target)?;
    Ok(())
}
