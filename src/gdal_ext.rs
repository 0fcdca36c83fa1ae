use std::ffi::CString;
use std::path::Path;
use std::ptr;

use gdal::errors::GdalError;
use gdal::vector::Layer;
use gdal::vector::LayerAccess;
use gdal::Driver;

// Extension traits for OGR entry points the gdal crate doesn't wrap yet.

pub(crate) trait LayerClip {
    fn clip_into(&self, method: &Layer, result: &Layer) -> Result<(),GdalError>;
}

impl LayerClip for Layer<'_> {

    fn clip_into(&self, method: &Layer, result: &Layer) -> Result<(),GdalError> {

        let rv = unsafe {
            gdal_sys::OGR_L_Clip(
                self.c_layer(),
                method.c_layer(),
                result.c_layer(),
                ptr::null_mut(),
                None,
                ptr::null_mut(),
            )
        };
        if rv != gdal_sys::OGRErr::OGRERR_NONE {
            return Err(GdalError::OgrError {
                err: rv,
                method_name: "OGR_L_Clip",
            });
        }
        Ok(())
    }
}

pub(crate) trait DriverDelete {
    fn delete_dataset(&self, path: &Path) -> Result<(),GdalError>;
}

impl DriverDelete for Driver {

    fn delete_dataset(&self, path: &Path) -> Result<(),GdalError> {

        let c_path = CString::new(path.to_string_lossy().as_ref())?;
        let rv = unsafe { gdal_sys::GDALDeleteDataset(self.c_driver(), c_path.as_ptr()) };
        if rv != gdal_sys::CPLErr::CE_None {
            return Err(GdalError::CplError {
                class: rv,
                number: 0,
                msg: "GDALDeleteDataset".to_owned(),
            });
        }
        Ok(())
    }
}
