/// Bit helpers for the FAST segment test

/// Check if `mask` (one bit per circle pixel) holds at least `min_count`
/// contiguous set bits, wrapping around the 16-pixel circle.
pub fn has_contiguous_arc(mask: u16, min_count: usize) -> bool {
    if min_count > 16 || min_count == 0 {
        return false;
    }
    if mask == u16::MAX {
        return true;
    }

    // AND the mask with its own rotations; a surviving bit starts a run
    let mut run = mask;
    for i in 1..min_count {
        run &= mask.rotate_right(i as u32);
        if run == 0 {
            return false;
        }
    }

    run != 0
}

/// Number of set bits among the four compass pixels (0, 4, 8, 12).
///
/// A contiguous arc of 9 or more always covers at least two of them.
#[inline]
pub fn compass_count(mask: u16) -> u32 {
    (mask & 0b0001_0001_0001_0001).count_ones()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn reference_arc(mask: u16, min_count: usize) -> bool {
        if min_count == 0 || min_count > 16 {
            return false;
        }
        let mut current = 0;
        for i in 0..32 {
            if mask & (1 << (i % 16)) != 0 {
                current += 1;
                if current >= min_count {
                    return true;
                }
            } else {
                current = 0;
            }
        }
        false
    }

    #[test]
    fn test_contiguous_simple() {
        let mask = 0b0000_0001_1111_1111;
        assert!(has_contiguous_arc(mask, 9));
        assert!(!has_contiguous_arc(mask, 10));
    }

    #[test]
    fn test_contiguous_wrap_around() {
        // bits 12..16 and 0..5 form one run of 9
        let mask = 0b1111_0000_0001_1111;
        assert!(has_contiguous_arc(mask, 9));
    }

    #[test]
    fn test_alternating_bits() {
        assert!(!has_contiguous_arc(0b0101_0101_0101_0101, 2));
    }

    #[test]
    fn test_full_circle() {
        assert!(has_contiguous_arc(u16::MAX, 16));
        assert!(!has_contiguous_arc(0, 1));
    }

    proptest! {
        #[test]
        fn prop_matches_reference(mask in any::<u16>(), n in 1usize..=16) {
            prop_assert_eq!(has_contiguous_arc(mask, n), reference_arc(mask, n));
        }

        #[test]
        fn prop_nine_arc_hits_two_compass_points(mask in any::<u16>()) {
            if has_contiguous_arc(mask, 9) {
                prop_assert!(compass_count(mask) >= 2);
            }
        }
    }
}
