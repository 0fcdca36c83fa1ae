use std::error::Error;
use std::fmt::Display;
use std::path::PathBuf;

pub use gdal::errors::GdalError;
use ordered_float::FloatIsNan;

#[derive(Debug)]
pub enum MapError {
    Gdal(GdalError),
    FloatIsNan,
    FeatureIndexOutOfRange{index: u64, count: u64},
    MissingGeometry(u64),
    MissingField(String),
    NonNumericField(String),
    FieldNotCopied{field: String, error: GdalError},
    OutputDirectory{path: PathBuf, error: std::io::Error},
    NoClippedFeatures,
    ClippedAreaIsZero,
}

impl Error for MapError {

}

impl Display for MapError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Gdal(a) => write!(f,"gdal: {}",a),
            Self::FloatIsNan => write!(f,"A float was not a number."),
            Self::FeatureIndexOutOfRange{index, count} => write!(f,"Feature index '{}' is out of range for a layer with '{}' features.",index,count),
            Self::MissingGeometry(a) => write!(f,"While mapping features, the record at offset '{}' had no geometry to transform.",a),
            Self::MissingField(a) => write!(f,"While reading clipped features, a record had no value for '{}'.",a),
            Self::NonNumericField(a) => write!(f,"Field '{}' does not hold a numeric value.",a),
            Self::FieldNotCopied{field, error} => write!(f,"Field '{}' could not be created on the output layer: {}",field,error),
            Self::OutputDirectory{path, error} => write!(f,"Could not create output directory '{}': {}",path.display(),error),
            Self::NoClippedFeatures => write!(f,"Clipping left no features to average over."),
            Self::ClippedAreaIsZero => write!(f,"Clipped features have no area, so their values can't be weighted."),
        }
    }
}

impl From<GdalError> for MapError {

    fn from(value: GdalError) -> Self {
        Self::Gdal(value)
    }
}

impl From<FloatIsNan> for MapError {

    fn from(_: FloatIsNan) -> Self {
        Self::FloatIsNan
    }

}
