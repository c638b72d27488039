//! Cell value trait shared by every grid in the pipeline

use num_traits::{NumCast, Zero};
use std::fmt::Debug;

/// Types that can be stored in a raster cell.
///
/// Elevation, HAND and accumulation grids use `f64`; flow direction and
/// boolean masks use `u8`; soil classes use `i32`.
pub trait RasterElement:
    Copy + Clone + Debug + PartialOrd + PartialEq + NumCast + Zero + Send + Sync + 'static
{
    /// No-data sentinel written when a grid has none configured
    fn default_nodata() -> Self;

    /// Check if this value represents no-data
    fn is_nodata(&self, nodata: Option<Self>) -> bool;

    /// Convert self to f64
    fn to_f64(self) -> Option<f64> {
        NumCast::from(self)
    }

    /// Convert from f64, falling back to the default nodata value
    fn from_f64(value: f64) -> Self {
        NumCast::from(value).unwrap_or_else(Self::default_nodata)
    }
}

macro_rules! impl_int_element {
    ($t:ty, $nodata:expr) => {
        impl RasterElement for $t {
            fn default_nodata() -> Self {
                $nodata
            }

            fn is_nodata(&self, nodata: Option<Self>) -> bool {
                nodata == Some(*self)
            }
        }
    };
}

macro_rules! impl_float_element {
    ($t:ty) => {
        impl RasterElement for $t {
            fn default_nodata() -> Self {
                <$t>::NAN
            }

            // NaN is always no-data, whatever sentinel the grid declares
            fn is_nodata(&self, nodata: Option<Self>) -> bool {
                if self.is_nan() {
                    return true;
                }
                match nodata {
                    Some(nd) if nd.is_nan() => false,
                    Some(nd) => (self - nd).abs() <= <$t>::EPSILON * nd.abs().max(1.0),
                    None => false,
                }
            }
        }
    };
}

impl_int_element!(u8, 0);
impl_int_element!(i32, -9999);
impl_float_element!(f32);
impl_float_element!(f64);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_float_nodata() {
        assert!(f64::NAN.is_nodata(None));
        assert!((-9999.0_f64).is_nodata(Some(-9999.0)));
        assert!(!(12.5_f64).is_nodata(Some(-9999.0)));
        assert!(!(12.5_f64).is_nodata(Some(f64::NAN)));
    }

    #[test]
    fn test_int_from_f64() {
        assert_eq!(<i32 as RasterElement>::from_f64(3.0), 3);
        assert_eq!(<u8 as RasterElement>::from_f64(f64::NAN), 0);
        assert_eq!(<i32 as RasterElement>::from_f64(f64::NAN), -9999);
    }
}
