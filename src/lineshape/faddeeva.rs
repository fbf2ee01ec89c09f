//! Complex probability function `w(z) = exp(-z²) erfc(-iz)`.
//!
//! Humlicek's 12-term rational approximation (CPF12), accurate to about
//! 1e-6 relative in the upper half plane. The lower half plane uses the
//! reflection `w(z) = 2 exp(-z²) - w(-z)`.

use num_complex::Complex64;

const T: [f64; 6] = [
    0.314240376,
    0.947788391,
    1.59768264,
    2.27950708,
    3.02063703,
    3.8897249,
];
const U: [f64; 6] = [
    1.01172805,
    -0.75197147,
    0.012557727,
    0.0100220082,
    -2.42068135e-4,
    5.00848061e-7,
];
const S: [f64; 6] = [
    1.393237,
    0.231152406,
    -0.155351466,
    0.00621836624,
    9.19082986e-5,
    -6.27525958e-7,
];

/// CPF12 for `y >= 0`.
fn cpf12(x: f64, y: f64) -> Complex64 {
    let mut wr = 0.0;
    let mut wi = 0.0;
    let y1 = y + 1.5;
    let y2 = y1 * y1;

    if y > 0.85 || x.abs() < 18.1 * y + 1.65 {
        // region I
        for i in 0..6 {
            let r = x - T[i];
            let d = 1.0 / (r * r + y2);
            let d1 = y1 * d;
            let d2 = r * d;
            let r = x + T[i];
            let d = 1.0 / (r * r + y2);
            let d3 = y1 * d;
            let d4 = r * d;
            wr += U[i] * (d1 + d3) - S[i] * (d2 - d4);
            wi += U[i] * (d2 + d4) + S[i] * (d1 - d3);
        }
    } else {
        // region II
        if x.abs() < 12.0 {
            wr = (-x * x).exp();
        }
        let y3 = y + 3.0;
        for i in 0..6 {
            let r = x - T[i];
            let r2 = r * r;
            let d = 1.0 / (r2 + y2);
            let d1 = y1 * d;
            let d2 = r * d;
            wr += y * (U[i] * (r * d2 - 1.5 * d1) + S[i] * y3 * d2) / (r2 + 2.25);

            let r = x + T[i];
            let r2 = r * r;
            let d = 1.0 / (r2 + y2);
            let d3 = y1 * d;
            let d4 = r * d;
            wr += y * (U[i] * (r * d4 - 1.5 * d3) - S[i] * y3 * d4) / (r2 + 2.25);
            wi += U[i] * (d2 + d4) + S[i] * (d1 - d3);
        }
    }

    Complex64::new(wr, wi)
}

/// The Faddeeva function at `z`.
pub fn faddeeva(z: Complex64) -> Complex64 {
    if z.im >= 0.0 {
        cpf12(z.re, z.im)
    } else {
        2.0 * (-z * z).exp() - cpf12(-z.re, -z.im)
    }
}
