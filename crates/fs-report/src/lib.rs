//! fs-report: stream tables and value listings for solved flowsheets.
//!
//! Everything here is presentation. Negative and undefined values are shown
//! as `0.0`; the engine itself never clamps.

pub mod listing;
pub mod table;

pub use listing::{ListingEntry, listing, render_listing};
pub use table::{StreamRow, StreamTable};

/// Display form of a solved value: negative or undefined becomes `0.0`.
pub fn display_value(value: f64) -> f64 {
    if value.is_nan() || value < 0.0 { 0.0 } else { value }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn undefined_and_negative_show_as_zero() {
        assert_eq!(display_value(f64::NAN), 0.0);
        assert_eq!(display_value(-1e-12), 0.0);
        assert_eq!(display_value(3.5), 3.5);
    }

    proptest! {
        #[test]
        fn display_is_never_negative(v in proptest::num::f64::ANY) {
            let shown = display_value(v);
            prop_assert!(shown >= 0.0);
            if v >= 0.0 {
                prop_assert_eq!(shown, v);
            }
        }
    }
}
