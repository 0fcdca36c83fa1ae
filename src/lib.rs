/*!
Layermap is a thin set of convenience operations over GDAL vector layers:
buffering, reprojection, attribute filtering, and area-weighted averaging of
a field over a clipped layer. The geometry work itself (buffering, coordinate
transformation, clipping) is GDAL's; what this crate adds is the
orchestration around it, built on one generic routine that copies a feature
layer while running every geometry through a caller-supplied transform and
carrying the attribute schema along unchanged. See [`mapper::map_layer`].

Layer cursors in GDAL are stateful, so everything here is synchronous and
single-threaded. Callers wanting parallelism must work on disjoint source
layers and disjoint output locations. Output locations may be filesystem
paths or locations in GDAL's `/vsimem/` virtual filesystem; both are treated
the same way, and both are overwritten, never merged.
*/

pub mod errors;
pub(crate) mod gdal_ext;
pub mod mapper;
pub mod ops;
pub mod progress;
pub mod srs;

pub use crate::errors::MapError;
pub use crate::mapper::field_schema;
pub use crate::mapper::map_dataset;
pub use crate::mapper::map_layer;
pub use crate::mapper::FeatureSelection;
pub use crate::mapper::FieldSpec;
pub use crate::mapper::NoTransform;
pub use crate::ops::area_weighted_mean;
pub use crate::ops::buffer_dataset;
pub use crate::ops::buffer_layer;
pub use crate::ops::filter_dataset;
pub use crate::ops::reproject_dataset;
pub use crate::ops::reproject_layer;
pub use crate::ops::FeatureFilter;
pub use crate::progress::ConsoleProgressBar;
pub use crate::progress::ProgressObserver;
pub use crate::srs::wgs84;
