//! Property tests for the RGB/HSL color model.

use proptest::prelude::*;
use sbar_style::{Color, Hsl, Rgb};

fn close(a: Rgb, b: Rgb) -> bool {
    a.r.abs_diff(b.r) <= 1 && a.g.abs_diff(b.g) <= 1 && a.b.abs_diff(b.b) <= 1
}

proptest! {
    #[test]
    fn rgb_survives_hsl_conversion(r in any::<u8>(), g in any::<u8>(), b in any::<u8>()) {
        let rgb = Rgb::new(r, g, b);
        prop_assert!(close(rgb.to_hsl().to_rgb(), rgb));
    }

    #[test]
    fn hsl_components_stay_in_range(r in any::<u8>(), g in any::<u8>(), b in any::<u8>()) {
        let hsl = Rgb::new(r, g, b).to_hsl();
        prop_assert!((0.0..360.0).contains(&hsl.h));
        prop_assert!((0.0..=1.0).contains(&hsl.s));
        prop_assert!((0.0..=1.0).contains(&hsl.l));
    }

    #[test]
    fn cached_conversion_matches_uncached(h in 0.0f32..360.0, s in 0.0f32..=1.0, l in 0.0f32..=1.0) {
        let mut color = Color::hsl(h, s, l);
        let direct = color.to_rgb();
        prop_assert_eq!(color.rgb_cached(), direct);
        prop_assert_eq!(color.rgb_cached(), direct);
        prop_assert_eq!(color, Color::from(Hsl::new(h, s, l)));
    }

    #[test]
    fn rgb_equality_is_reflexive_across_forms(r in any::<u8>(), g in any::<u8>(), b in any::<u8>()) {
        let color = Color::rgb(r, g, b);
        let mut copy = color;
        copy.hsl_cached();
        prop_assert_eq!(color, copy);
        prop_assert_eq!(Color::from(Rgb::new(r, g, b)), color);
    }
}
