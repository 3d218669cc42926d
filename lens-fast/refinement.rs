use lens_core::Image;
use crate::types::{Corner, ScoredKeypoint};

/// Non-maximum suppression, orientation and ranking of detected corners
pub struct KeypointRefinement;

impl KeypointRefinement {
    /// Keep pixels whose score is strictly greater than all 8 neighbours.
    ///
    /// Plateaus of equal score are dropped entirely, which keeps the result
    /// independent of scan order. Pixels on the image edge never qualify
    /// since their window is incomplete, so `border` is at least 1.
    pub fn non_maximum_suppression(scores: &[u32], width: usize, height: usize, border: usize) -> Vec<Corner> {
        let border = border.max(1);
        let mut corners = Vec::new();
        if width <= 2 * border || height <= 2 * border {
            return corners;
        }

        for y in border..height - border {
            for x in border..width - border {
                let score = scores[y * width + x];
                if score == 0 {
                    continue;
                }

                let mut is_local_max = true;
                'window: for ny in y - 1..=y + 1 {
                    for nx in x - 1..=x + 1 {
                        if (nx, ny) != (x, y) && scores[ny * width + nx] >= score {
                            is_local_max = false;
                            break 'window;
                        }
                    }
                }

                if is_local_max {
                    corners.push(Corner { x, y, score });
                }
            }
        }

        corners
    }

    /// Compute orientation using the intensity centroid of a circular patch
    pub fn compute_orientation(img: &Image, width: usize, height: usize, x: usize, y: usize, patch_size: usize) -> f32 {
        let half = (patch_size / 2) as i32;
        let (cx, cy) = (x as i32, y as i32);

        // Default angle when the patch does not fit
        if cx - half < 0 || cy - half < 0 || cx + half >= width as i32 || cy + half >= height as i32 {
            return 0.0;
        }

        let radius_sq = half * half;
        let mut m10 = 0i64;
        let mut m01 = 0i64;

        for dy in -half..=half {
            let yy = (cy + dy) as usize;
            for dx in -half..=half {
                if dx * dx + dy * dy > radius_sq {
                    continue;
                }
                let xx = (cx + dx) as usize;
                let val = img[yy * width + xx] as i64;
                m10 += dx as i64 * val;
                m01 += dy as i64 * val;
            }
        }

        if m10 == 0 && m01 == 0 {
            0.0
        } else {
            (m01 as f32).atan2(m10 as f32)
        }
    }

    /// Keep the `limit` strongest keypoints.
    ///
    /// Ties on response fall back to position so the selection is a pure
    /// function of the input set.
    pub fn retain_best(mut keypoints: Vec<ScoredKeypoint>, limit: usize) -> Vec<ScoredKeypoint> {
        keypoints.sort_by(|a, b| {
            b.response
                .total_cmp(&a.response)
                .then_with(|| a.keypoint.y.total_cmp(&b.keypoint.y))
                .then_with(|| a.keypoint.x.total_cmp(&b.keypoint.x))
        });
        keypoints.truncate(limit);
        keypoints
    }
}
