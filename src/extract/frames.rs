use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};
use rand::Rng;

use super::TargetSize;

/// Scale-then-center-crop geometry for one source image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropPlan {
    pub scaled_width: u32,
    pub scaled_height: u32,
    pub left: u32,
    pub top: u32,
}

/// Work out how to scale a `src_width`x`src_height` image so it covers
/// `target`, and where to cut the centered target-sized box.
///
/// Sources wider than the target ratio are scaled to the target height,
/// others to the target width. Rounding can leave the other side one pixel
/// short, so it is floored at the target dimension, which also keeps the
/// crop box inside the scaled image. Both source dimensions must be non-zero.
pub fn crop_plan(src_width: u32, src_height: u32, target: TargetSize) -> CropPlan {
    let src_ratio = src_width as f64 / src_height as f64;

    let (scaled_width, scaled_height) = if src_ratio > target.aspect_ratio() {
        let width = (src_width as f64 * target.height as f64 / src_height as f64).round() as u32;
        (width.max(target.width), target.height)
    } else {
        let height = (src_height as f64 * target.width as f64 / src_width as f64).round() as u32;
        (target.width, height.max(target.height))
    };

    CropPlan {
        scaled_width,
        scaled_height,
        left: (scaled_width - target.width) / 2,
        top: (scaled_height - target.height) / 2,
    }
}

/// Resize and center-crop an image to exactly `target`
pub fn fit_frame(image: &DynamicImage, target: TargetSize) -> DynamicImage {
    let (width, height) = image.dimensions();
    let plan = crop_plan(width, height, target);

    image
        .resize_exact(plan.scaled_width, plan.scaled_height, FilterType::Lanczos3)
        .crop_imm(plan.left, plan.top, target.width, target.height)
}

/// Pick `requested` distinct frame indices out of `total`, uniformly and
/// without replacement, returned in timeline order. Asking for more frames
/// than exist yields every frame.
pub fn sample_frame_indices<R: Rng + ?Sized>(total: usize, requested: usize, rng: &mut R) -> Vec<usize> {
    let amount = requested.min(total);
    let mut indices = rand::seq::index::sample(rng, total, amount).into_vec();
    indices.sort_unstable();
    indices
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const TARGET: TargetSize = TargetSize { width: 160, height: 90 };

    fn solid(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([200, 30, 60])))
    }

    #[test]
    fn wider_source_scales_to_target_height() {
        let plan = crop_plan(400, 100, TARGET);
        assert_eq!(plan, CropPlan { scaled_width: 360, scaled_height: 90, left: 100, top: 0 });
    }

    #[test]
    fn taller_source_scales_to_target_width() {
        let plan = crop_plan(1080, 1920, TARGET);
        assert_eq!(plan.scaled_width, 160);
        assert_eq!(plan.scaled_height, 284);
        assert_eq!(plan.left, 0);
        assert_eq!(plan.top, 97);
    }

    #[test]
    fn matching_ratio_needs_no_offset() {
        let plan = crop_plan(1920, 1080, TARGET);
        assert_eq!(plan, CropPlan { scaled_width: 160, scaled_height: 90, left: 0, top: 0 });
    }

    #[test]
    fn crop_box_always_fits_inside_scaled_image() {
        for (w, h) in [(1, 1), (3, 1000), (1000, 3), (161, 91), (159, 89), (641, 359), (7, 4)] {
            let plan = crop_plan(w, h, TARGET);
            assert!(plan.left + TARGET.width <= plan.scaled_width, "{}x{}", w, h);
            assert!(plan.top + TARGET.height <= plan.scaled_height, "{}x{}", w, h);
        }
    }

    #[test]
    fn fitted_frames_have_identical_dimensions() {
        for (w, h) in [(1080, 1920), (1920, 1080), (320, 180), (33, 47), (500, 120)] {
            let fitted = fit_frame(&solid(w, h), TARGET);
            assert_eq!(fitted.dimensions(), (160, 90), "source {}x{}", w, h);
        }
    }

    #[test]
    fn sampling_more_than_available_returns_every_frame_in_order() {
        let mut rng = StdRng::seed_from_u64(7);
        let indices = sample_frame_indices(6, 10, &mut rng);
        assert_eq!(indices, vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn sampled_indices_are_distinct_sorted_and_in_range() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..50 {
            let indices = sample_frame_indices(300, 5, &mut rng);
            assert_eq!(indices.len(), 5);
            assert!(indices.windows(2).all(|pair| pair[0] < pair[1]));
            assert!(indices.iter().all(|&i| i < 300));
        }
    }

    #[test]
    fn sampling_from_empty_video_yields_nothing() {
        let mut rng = StdRng::seed_from_u64(1);
        assert!(sample_frame_indices(0, 5, &mut rng).is_empty());
    }
}
