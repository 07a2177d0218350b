// ============================================================================
// Gray placeholder fill: rasterizes selection shapes into the working image
// ============================================================================

use image::{GrayImage, Luma, Rgba, RgbaImage};
use rayon::prelude::*;

use crate::canvas::SelectionShape;

/// RGB written into every selected pixel. Alpha is left as-is.
pub const FILL_GRAY: [u8; 3] = [128, 128, 128];

/// Pixels claimed by one selection shape during a fill.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Region {
    /// Row-major `(x, y)` coordinates.
    pub pixels: Vec<(u32, u32)>,
}

impl Region {
    pub fn len(&self) -> usize {
        self.pixels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    pub fn contains(&self, x: u32, y: u32) -> bool {
        self.pixels.binary_search_by(|&(px, py)| (py, px).cmp(&(y, x))).is_ok()
    }
}

/// Output of [`fill_shapes`].
#[derive(Clone)]
pub struct FillResult {
    /// Copy of the source with selected pixels grayed out.
    pub raster: RgbaImage,
    /// One entry per input shape, in input order (possibly empty).
    pub regions: Vec<Region>,
}

/// Gray out every pixel enclosed by `shapes`.
///
/// Each pixel is tested against the shapes in order and belongs to the first
/// one that contains it; later overlapping shapes never see it. Pixels under
/// any eraser stroke belong to no shape, whatever the order. Erase shapes
/// always get an empty region. Rows are
/// scanned in parallel, but the result (including the order of pixels inside
/// each region) is identical to a sequential row-major scan.
pub fn fill_shapes(src: &RgbaImage, shapes: &[SelectionShape]) -> FillResult {
    let (w, h) = src.dimensions();
    let mut raster = src.clone();
    let mut regions = vec![Region::default(); shapes.len()];
    if w == 0 || h == 0 || shapes.is_empty() {
        return FillResult { raster, regions };
    }

    // Shapes that can't enclose anything are skipped; bounds are a cheap reject.
    let bounded: Vec<(usize, &SelectionShape, (u32, u32, u32, u32))> = shapes
        .iter()
        .enumerate()
        .filter(|(_, s)| s.is_fillable())
        .filter_map(|(i, s)| s.bounds(w, h).map(|b| (i, s, b)))
        .collect();
    let (erasers, candidates): (Vec<_>, Vec<_>) = bounded.into_iter().partition(|(_, s, _)| s.is_erase());
    let covers = |shape: &SelectionShape, (x0, y0, x1, y1): (u32, u32, u32, u32), x: u32, y: u32| {
        x >= x0 && x <= x1 && y >= y0 && y <= y1 && shape.contains(x, y)
    };

    let row_bytes = w as usize * 4;
    let buf: &mut [u8] = &mut raster;
    let hits_per_row: Vec<Vec<(u32, usize)>> = buf
        .par_chunks_mut(row_bytes)
        .enumerate()
        .map(|(y, row)| {
            let y = y as u32;
            let mut hits = Vec::new();
            for x in 0..w {
                if erasers.iter().any(|(_, shape, b)| covers(*shape, *b, x, y)) {
                    continue;
                }
                let owner = candidates.iter().find(|(_, shape, b)| covers(*shape, *b, x, y));
                if let Some((idx, _, _)) = owner {
                    let o = x as usize * 4;
                    row[o..o + 3].copy_from_slice(&FILL_GRAY);
                    hits.push((x, *idx));
                }
            }
            hits
        })
        .collect();

    for (y, hits) in hits_per_row.into_iter().enumerate() {
        for (x, idx) in hits {
            regions[idx].pixels.push((x, y as u32));
        }
    }

    FillResult { raster, regions }
}

/// Binary mask (255 = selected) covering every region.
pub fn region_mask(width: u32, height: u32, regions: &[Region]) -> GrayImage {
    let mut mask = GrayImage::new(width, height);
    for region in regions {
        for &(x, y) in &region.pixels {
            if x < width && y < height {
                mask.put_pixel(x, y, Luma([255]));
            }
        }
    }
    mask
}

/// Full-resolution RGBA mask for the edit service: opaque white where
/// selected, transparent black elsewhere.
pub fn mask_to_rgba(mask: &GrayImage) -> RgbaImage {
    let (w, h) = mask.dimensions();
    RgbaImage::from_fn(w, h, |x, y| {
        if mask.get_pixel(x, y).0[0] > 0 {
            Rgba([255, 255, 255, 255])
        } else {
            Rgba([0, 0, 0, 0])
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::Point;

    fn gradient(w: u32, h: u32) -> RgbaImage {
        RgbaImage::from_fn(w, h, |x, y| Rgba([x as u8, y as u8, 200, (x + y) as u8 | 1]))
    }

    fn rect(x0: f32, y0: f32, x1: f32, y1: f32) -> SelectionShape {
        SelectionShape::Lasso(vec![
            Point::new(x0, y0),
            Point::new(x1, y0),
            Point::new(x1, y1),
            Point::new(x0, y1),
        ])
    }

    #[test]
    fn rectangle_grays_exact_range_and_keeps_alpha() {
        let src = gradient(32, 24);
        let result = fill_shapes(&src, &[rect(4.0, 6.0, 12.0, 10.0)]);
        for (x, y, px) in result.raster.enumerate_pixels() {
            let orig = src.get_pixel(x, y);
            let inside = (4..12).contains(&x) && (6..10).contains(&y);
            if inside {
                assert_eq!(&px.0[..3], &FILL_GRAY, "pixel ({x},{y}) should be gray");
                assert_eq!(px.0[3], orig.0[3], "alpha changed at ({x},{y})");
            } else {
                assert_eq!(px, orig, "pixel ({x},{y}) should be untouched");
            }
        }
        assert_eq!(result.regions.len(), 1);
        assert_eq!(result.regions[0].len(), 8 * 4);
    }

    #[test]
    fn first_shape_wins_on_overlap() {
        let src = gradient(20, 20);
        let result = fill_shapes(&src, &[rect(0.0, 0.0, 10.0, 10.0), rect(5.0, 5.0, 15.0, 15.0)]);
        assert_eq!(result.regions[0].len(), 100);
        assert_eq!(result.regions[1].len(), 100 - 25);
        assert!(result.regions[0].contains(7, 7));
        assert!(!result.regions[1].contains(7, 7));
        assert!(result.regions[1].contains(12, 12));
    }

    #[test]
    fn eraser_cuts_every_shape_regardless_of_order() {
        let src = gradient(20, 20);
        let eraser = SelectionShape::Erase {
            points: vec![Point::new(10.0, 0.0), Point::new(10.0, 19.0)],
            radius: 1.0,
        };
        let result = fill_shapes(&src, &[eraser.clone(), rect(0.0, 0.0, 20.0, 20.0)]);
        assert!(result.regions[0].is_empty());
        assert_eq!(result.regions[1].len(), 20 * 20 - 3 * 20);
        assert!(!result.regions[1].contains(10, 5));
        assert!(result.regions[1].contains(8, 5));
        assert_eq!(result.raster.get_pixel(10, 5), src.get_pixel(10, 5));

        let after = fill_shapes(&src, &[rect(0.0, 0.0, 20.0, 20.0), eraser]);
        assert_eq!(after.regions[0], result.regions[1]);
        assert_eq!(after.raster, result.raster);
    }

    #[test]
    fn regions_are_row_major() {
        let src = gradient(16, 16);
        let result = fill_shapes(&src, &[rect(2.0, 2.0, 6.0, 6.0)]);
        let pixels = &result.regions[0].pixels;
        assert_eq!(pixels.first(), Some(&(2, 2)));
        assert_eq!(pixels.get(1), Some(&(3, 2)));
        assert_eq!(pixels.last(), Some(&(5, 5)));
    }

    #[test]
    fn degenerate_shapes_leave_image_untouched() {
        let src = gradient(8, 8);
        let shapes = [SelectionShape::Lasso(vec![Point::new(0.0, 0.0), Point::new(7.0, 7.0)])];
        let result = fill_shapes(&src, &shapes);
        assert_eq!(result.raster, src);
        assert!(result.regions[0].is_empty());
    }

    #[test]
    fn mask_marks_every_region() {
        let src = gradient(10, 10);
        let result = fill_shapes(&src, &[rect(1.0, 1.0, 3.0, 3.0), rect(6.0, 6.0, 8.0, 8.0)]);
        let mask = region_mask(10, 10, &result.regions);
        assert_eq!(mask.pixels().filter(|p| p.0[0] == 255).count(), 8);
        let rgba = mask_to_rgba(&mask);
        assert_eq!(rgba.get_pixel(1, 1), &Rgba([255, 255, 255, 255]));
        assert_eq!(rgba.get_pixel(0, 0), &Rgba([0, 0, 0, 0]));
    }
}
