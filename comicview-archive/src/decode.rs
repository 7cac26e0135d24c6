use std::path::{Path, PathBuf};

use comicview_core::{Bitmap, DecodeError, PageDecoder};
use image::ImageReader;
use rayon::prelude::*;

/// Decodes page files with the `image` crate, sniffing the real format
/// instead of trusting the extension. Batches run on the rayon pool.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageDecoder;

fn open(path: &Path) -> Result<ImageReader<std::io::BufReader<std::fs::File>>, DecodeError> {
    let io_error = |source| DecodeError::Io {
        path: path.to_path_buf(),
        source,
    };
    ImageReader::open(path)
        .map_err(io_error)?
        .with_guessed_format()
        .map_err(io_error)
}

fn image_error(path: &Path, err: image::ImageError) -> DecodeError {
    DecodeError::Image {
        path: path.to_path_buf(),
        reason: err.to_string(),
    }
}

impl PageDecoder for ImageDecoder {
    fn decode(&self, path: &Path) -> Result<Bitmap, DecodeError> {
        let image = open(path)?
            .decode()
            .map_err(|err| image_error(path, err))?;
        let rgba = image.to_rgba8();
        Ok(Bitmap {
            width: rgba.width(),
            height: rgba.height(),
            pixels: rgba.into_raw(),
        })
    }

    fn probe(&self, path: &Path) -> Result<(u32, u32), DecodeError> {
        open(path)?
            .into_dimensions()
            .map_err(|err| image_error(path, err))
    }

    fn decode_batch(&self, paths: &[PathBuf]) -> Vec<Result<Bitmap, DecodeError>> {
        paths.par_iter().map(|path| self.decode(path)).collect()
    }

    fn probe_batch(&self, paths: &[PathBuf]) -> Vec<Result<(u32, u32), DecodeError>> {
        paths.par_iter().map(|path| self.probe(path)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use image::{ImageFormat, Rgba, RgbaImage};
    use tempfile::tempdir;

    #[test]
    fn decodes_and_probes_real_images() {
        let dir = tempdir().unwrap();
        let tall = dir.path().join("tall.png");
        // jpeg-named png still decodes
        let misnamed = dir.path().join("wide.jpg");
        RgbaImage::from_pixel(3, 5, Rgba([10, 20, 30, 255]))
            .save_with_format(&tall, ImageFormat::Png)
            .unwrap();
        RgbaImage::new(8, 2)
            .save_with_format(&misnamed, ImageFormat::Png)
            .unwrap();

        let decoder = ImageDecoder;
        let bitmap = decoder.decode(&tall).unwrap();
        assert_eq!((bitmap.width, bitmap.height), (3, 5));
        assert_eq!(bitmap.pixels.len(), 3 * 5 * 4);
        assert_eq!(&bitmap.pixels[..4], &[10, 20, 30, 255]);
        assert_eq!(decoder.probe(&misnamed).unwrap(), (8, 2));

        let batch = decoder.probe_batch(&[tall.clone(), misnamed.clone()]);
        assert_eq!(batch[0].as_ref().unwrap(), &(3, 5));
        assert_eq!(batch[1].as_ref().unwrap(), &(8, 2));
    }

    #[test]
    fn corrupt_and_missing_files_fail_per_page() {
        let dir = tempdir().unwrap();
        let corrupt = dir.path().join("corrupt.png");
        std::fs::write(&corrupt, b"\x89PNG\r\n\x1a\nbroken").unwrap();
        let missing = dir.path().join("missing.png");

        let results = ImageDecoder.decode_batch(&[corrupt, missing]);
        assert!(matches!(results[0], Err(DecodeError::Image { .. })));
        assert!(matches!(results[1], Err(DecodeError::Io { .. })));
    }
}
