//! One dimensional minimization with bracketing and Brent's method.
use crate::constants::{LINE_SEARCH_ITERATIONS, LINE_SEARCH_TOLERANCE};

const GOLDEN: f64 = 1.618_033_988_749_895;
const CGOLD: f64 = 0.381_966_011_250_105;
const GROW_LIMIT: f64 = 100.0;
const TINY: f64 = 1e-20;

/// Points `a < b < c` (or `a > b > c`) with `f(b)` below `f(a)` and `f(c)`, searched downhill from `a` and `b`.
/// Returns None if no bracket was found within the iteration limit.
pub fn bracket<F: Fn(f64) -> f64>(f: &F, a: f64, b: f64) -> Option<(f64, f64, f64)> {
    let (mut a, mut b) = (a, b);
    let (mut fa, mut fb) = (f(a), f(b));
    if fb > fa {
        std::mem::swap(&mut a, &mut b);
        std::mem::swap(&mut fa, &mut fb);
    }
    let mut c = b + GOLDEN * (b - a);
    let mut fc = f(c);
    for _ in 0..LINE_SEARCH_ITERATIONS {
        if fb <= fc {
            return Some((a, b, c));
        }
        let r = (b - a) * (fb - fc);
        let q = (b - c) * (fb - fa);
        let denom = 2.0 * (q - r).abs().max(TINY).copysign(q - r);
        let mut u = b - ((b - c) * q - (b - a) * r) / denom;
        let ulim = b + GROW_LIMIT * (c - b);
        let mut fu;
        if (b - u) * (u - c) > 0.0 {
            fu = f(u);
            if fu < fc {
                return Some((b, u, c));
            } else if fu > fb {
                return Some((a, b, u));
            }
            u = c + GOLDEN * (c - b);
            fu = f(u);
        } else if (c - u) * (u - ulim) > 0.0 {
            fu = f(u);
            if fu < fc {
                b = c;
                c = u;
                u = c + GOLDEN * (c - b);
                fb = fc;
                fc = fu;
                fu = f(u);
            }
        } else if (u - ulim) * (ulim - c) >= 0.0 {
            u = ulim;
            fu = f(u);
        } else {
            u = c + GOLDEN * (c - b);
            fu = f(u);
        }
        a = b;
        b = c;
        c = u;
        fa = fb;
        fb = fc;
        fc = fu;
    }
    None
}

/// Minimum of `f` inside the bracket `(a, b, c)` by Brent's method.
pub fn brent<F: Fn(f64) -> f64>(f: &F, bracket: (f64, f64, f64), tolerance: f64) -> f64 {
    let (ax, bx, cx) = bracket;
    let (mut a, mut b) = (ax.min(cx), ax.max(cx));
    let (mut x, mut w, mut v) = (bx, bx, bx);
    let mut fx = f(x);
    let (mut fw, mut fv) = (fx, fx);
    let (mut d, mut e): (f64, f64) = (0.0, 0.0);
    for _ in 0..LINE_SEARCH_ITERATIONS {
        let xm = 0.5 * (a + b);
        let tol1 = tolerance * x.abs() + TINY;
        let tol2 = 2.0 * tol1;
        if (x - xm).abs() <= tol2 - 0.5 * (b - a) {
            return x;
        }
        if e.abs() > tol1 {
            // Parabolic step through x, v and w.
            let r = (x - w) * (fx - fv);
            let mut q = (x - v) * (fx - fw);
            let mut p = (x - v) * q - (x - w) * r;
            q = 2.0 * (q - r);
            if q > 0.0 {
                p = -p;
            }
            q = q.abs();
            let etemp = e;
            e = d;
            if p.abs() >= (0.5 * q * etemp).abs() || p <= q * (a - x) || p >= q * (b - x) {
                e = if x >= xm { a - x } else { b - x };
                d = CGOLD * e;
            } else {
                d = p / q;
                let u = x + d;
                if u - a < tol2 || b - u < tol2 {
                    d = tol1.copysign(xm - x);
                }
            }
        } else {
            e = if x >= xm { a - x } else { b - x };
            d = CGOLD * e;
        }
        let u = if d.abs() >= tol1 { x + d } else { x + tol1.copysign(d) };
        let fu = f(u);
        if fu <= fx {
            if u >= x {
                a = x;
            } else {
                b = x;
            }
            v = w;
            w = x;
            x = u;
            fv = fw;
            fw = fx;
            fx = fu;
        } else {
            if u < x {
                a = u;
            } else {
                b = u;
            }
            if fu <= fw || w == x {
                v = w;
                w = u;
                fv = fw;
                fw = fu;
            } else if fu <= fv || v == x || v == w {
                v = u;
                fv = fu;
            }
        }
    }
    x
}

/// Step length along a search direction, `f(c)` being the loss after a step of length `c`.
/// Falls back to 0 if the search doesn't improve on not moving at all.
pub fn line_search<F: Fn(f64) -> f64>(f: F) -> f64 {
    let f0 = f(0.0);
    let step = match bracket(&f, 0.0, 1.0) {
        Some(b) => brent(&f, b, LINE_SEARCH_TOLERANCE),
        None => return 0.0,
    };
    if !step.is_finite() || f(step) > f0 {
        0.0
    } else {
        step
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_quadratic() {
        let f = |x: f64| (x - 3.5) * (x - 3.5) + 1.0;
        let b = bracket(&f, 0.0, 1.0).unwrap();
        assert!(f(b.1) <= f(b.0) && f(b.1) <= f(b.2));
        assert_relative_eq!(brent(&f, b, 1e-10), 3.5, epsilon = 1e-6);
        assert_relative_eq!(line_search(f), 3.5, epsilon = 1e-6);
    }

    #[test]
    fn test_minimum_left_of_start() {
        let f = |x: f64| (x + 2.0).powi(2);
        assert_relative_eq!(line_search(f), -2.0, epsilon = 1e-6);
    }

    #[test]
    fn test_non_smooth() {
        let f = |x: f64| (x - 0.25).abs() + 2.0 * (x - 0.75).abs();
        assert_relative_eq!(line_search(f), 0.75, epsilon = 1e-5);
    }

    #[test]
    fn test_unbounded_falls_back_to_zero() {
        let f = |x: f64| -x;
        assert_eq!(line_search(f), 0.0);
    }
}
