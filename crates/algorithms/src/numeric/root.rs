//! Bracketed scalar root finding (Brent 1973)
//!
//! Combines bisection, the secant method and inverse quadratic
//! interpolation. Each step keeps the root bracketed, so the method always
//! converges for a continuous function whose endpoint values differ in sign.

/// Relative tolerance applied on top of `xtol`
const RTOL: f64 = 4.0 * f64::EPSILON;

/// Solver parameters
#[derive(Debug, Clone, Copy)]
pub struct RootParams {
    /// Absolute tolerance on the root location
    pub xtol: f64,
    pub max_iter: usize,
}

impl Default for RootParams {
    fn default() -> Self {
        Self {
            xtol: 2e-12,
            max_iter: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RootError {
    #[error("f({a}) = {fa} and f({b}) = {fb} do not bracket a root")]
    NotBracketed { a: f64, b: f64, fa: f64, fb: f64 },

    #[error("no convergence after {iterations} iterations (last estimate {last})")]
    NoConvergence { iterations: usize, last: f64 },
}

/// Find a root of `f` in `[a, b]`.
///
/// `f(a)` and `f(b)` must be finite with opposite signs (or one of them
/// zero). Returns an `x` within `xtol` of a sign change of `f`.
pub fn brent<F>(mut f: F, a: f64, b: f64, params: RootParams) -> Result<f64, RootError>
where
    F: FnMut(f64) -> f64,
{
    let (mut xpre, mut xcur) = (a, b);
    let (mut fpre, mut fcur) = (f(xpre), f(xcur));

    if !fpre.is_finite() || !fcur.is_finite() || fpre * fcur > 0.0 {
        return Err(RootError::NotBracketed { a, b, fa: fpre, fb: fcur });
    }
    if fpre == 0.0 {
        return Ok(xpre);
    }
    if fcur == 0.0 {
        return Ok(xcur);
    }

    let (mut xblk, mut fblk) = (0.0, 0.0);
    let (mut spre, mut scur) = (0.0, 0.0);

    for _ in 0..params.max_iter {
        if fpre != 0.0 && fcur != 0.0 && fpre.is_sign_negative() != fcur.is_sign_negative() {
            xblk = xpre;
            fblk = fpre;
            spre = xcur - xpre;
            scur = spre;
        }
        if fblk.abs() < fcur.abs() {
            xpre = xcur;
            xcur = xblk;
            xblk = xpre;
            fpre = fcur;
            fcur = fblk;
            fblk = fpre;
        }

        let delta = (params.xtol + RTOL * xcur.abs()) / 2.0;
        let sbis = (xblk - xcur) / 2.0;
        if fcur == 0.0 || sbis.abs() < delta {
            return Ok(xcur);
        }

        if spre.abs() > delta && fcur.abs() < fpre.abs() {
            let stry = if xpre == xblk {
                // Secant
                -fcur * (xcur - xpre) / (fcur - fpre)
            } else {
                // Inverse quadratic interpolation
                let dpre = (fpre - fcur) / (xpre - xcur);
                let dblk = (fblk - fcur) / (xblk - xcur);
                -fcur * (fblk * dblk - fpre * dpre) / (dblk * dpre * (fblk - fpre))
            };

            if 2.0 * stry.abs() < spre.abs().min(3.0 * sbis.abs() - delta) {
                spre = scur;
                scur = stry;
            } else {
                spre = sbis;
                scur = sbis;
            }
        } else {
            spre = sbis;
            scur = sbis;
        }

        xpre = xcur;
        fpre = fcur;
        if scur.abs() > delta {
            xcur += scur;
        } else {
            xcur += if sbis > 0.0 { delta } else { -delta };
        }
        fcur = f(xcur);
    }

    Err(RootError::NoConvergence {
        iterations: params.max_iter,
        last: xcur,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_square_root_of_two() {
        let root = brent(|x| x * x - 2.0, 0.0, 2.0, RootParams::default()).unwrap();
        assert_relative_eq!(root, 2f64.sqrt(), epsilon = 1e-10);
    }

    #[test]
    fn test_transcendental() {
        let root = brent(|x| x.cos() - x, 0.0, 1.0, RootParams::default()).unwrap();
        assert_relative_eq!(root, 0.739_085_133_215_160_6, epsilon = 1e-10);
    }

    #[test]
    fn test_reversed_bracket_and_coarse_tolerance() {
        let params = RootParams { xtol: 0.01, max_iter: 100 };
        let root = brent(|x| x - 3.3, 10.0, -10.0, params).unwrap();
        assert!((root - 3.3).abs() <= 0.01);
    }

    #[test]
    fn test_root_at_endpoint() {
        assert_eq!(brent(|x| x - 1.0, 1.0, 5.0, RootParams::default()).unwrap(), 1.0);
    }

    #[test]
    fn test_not_bracketed() {
        let err = brent(|x| x * x + 1.0, -1.0, 1.0, RootParams::default()).unwrap_err();
        assert!(matches!(err, RootError::NotBracketed { fa, fb, .. } if fa == 2.0 && fb == 2.0));
        assert!(brent(|_| f64::NAN, 0.0, 1.0, RootParams::default()).is_err());
    }

    #[test]
    fn test_no_convergence() {
        let params = RootParams { xtol: 1e-15, max_iter: 1 };
        let err = brent(|x| x.powi(3) - 0.3, 0.0, 1.0, params).unwrap_err();
        assert!(matches!(err, RootError::NoConvergence { iterations: 1, .. }));
    }
}
