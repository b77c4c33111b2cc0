//! Oriented pixel dimensions from image headers.

use image::metadata::Orientation;
use image::{ImageDecoder, ImageReader};
use std::fs::File;
use std::io::BufReader;

use super::{Dimensions, GeometryError};

/// Read stored dimensions from `probe` and the EXIF orientation from `pixels`,
/// swapping width and height for orientations that rotate by 90 degrees.
pub fn oriented_dimensions(probe: File, pixels: File) -> Result<Dimensions, GeometryError> {
    let (width, height) = ImageReader::new(BufReader::new(probe))
        .with_guessed_format()?
        .into_dimensions()?;

    let mut decoder = ImageReader::new(BufReader::new(pixels))
        .with_guessed_format()?
        .into_decoder()?;
    let orientation = decoder.orientation()?;

    Ok(apply_orientation(width, height, orientation))
}

fn apply_orientation(width: u32, height: u32, orientation: Orientation) -> Dimensions {
    match orientation {
        Orientation::Rotate90
        | Orientation::Rotate270
        | Orientation::Rotate90FlipH
        | Orientation::Rotate270FlipH => Dimensions {
            width: height,
            height: width,
        },
        _ => Dimensions { width, height },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};
    use tempfile::tempdir;

    #[test]
    fn test_apply_orientation() {
        assert_eq!(
            apply_orientation(40, 30, Orientation::NoTransforms),
            Dimensions {
                width: 40,
                height: 30
            }
        );
        assert_eq!(
            apply_orientation(40, 30, Orientation::Rotate90),
            Dimensions {
                width: 30,
                height: 40
            }
        );
        assert_eq!(
            apply_orientation(40, 30, Orientation::Rotate180),
            Dimensions {
                width: 40,
                height: 30
            }
        );
        assert_eq!(
            apply_orientation(40, 30, Orientation::Rotate270FlipH),
            Dimensions {
                width: 30,
                height: 40
            }
        );
    }

    #[test]
    fn test_png_without_orientation() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("plain.png");
        let img: ImageBuffer<Rgb<u8>, Vec<u8>> = ImageBuffer::new(12, 7);
        img.save(&path).unwrap();

        let dims =
            oriented_dimensions(File::open(&path).unwrap(), File::open(&path).unwrap()).unwrap();
        assert_eq!(
            dims,
            Dimensions {
                width: 12,
                height: 7
            }
        );
    }

    #[test]
    fn test_not_an_image() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("fake.jpg");
        std::fs::write(&path, b"definitely not a jpeg").unwrap();

        let result = oriented_dimensions(File::open(&path).unwrap(), File::open(&path).unwrap());
        assert!(result.is_err());
    }
}
