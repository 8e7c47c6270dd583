//! Seeded 2-D OpenSimplex noise.
//!
//! The permutation comes from a 32-bit LCG over the seed, so a seed names the
//! same world on every platform and build.

use noise::NoiseFn;

const STRETCH: f64 = -0.211_324_865_405_187; // (1/sqrt(3) - 1) / 2
const SQUISH: f64 = 0.366_025_403_784_439; // (sqrt(3) - 1) / 2
const NORM: f64 = 1.0 / 47.0;

const GRADIENTS: [f64; 16] = [
    5.0, 2.0, 2.0, 5.0, -5.0, 2.0, -2.0, 5.0, 5.0, -2.0, 2.0, -5.0, -5.0, -2.0, -2.0, -5.0,
];

fn shuffle_seed(seed: u32) -> u32 {
    seed.wrapping_mul(1_664_525).wrapping_add(1_013_904_223)
}

/// OpenSimplex noise over a seeded permutation table.
#[derive(Clone)]
pub struct SeededSimplex {
    perm: [u8; 256],
}

impl SeededSimplex {
    pub fn new(seed: u32) -> Self {
        let mut source: [u8; 256] = std::array::from_fn(|i| i as u8);
        let mut perm = [0u8; 256];
        let mut seed = shuffle_seed(shuffle_seed(shuffle_seed(seed)));

        for i in (0..256usize).rev() {
            seed = shuffle_seed(seed);
            let r = ((seed as u64 + 31) % (i as u64 + 1)) as usize;
            perm[i] = source[r];
            source[r] = source[i];
        }
        Self { perm }
    }

    /// Gradient dot product at lattice vertex (xsb, ysb).
    fn extrapolate(&self, xsb: i64, ysb: i64, dx: f64, dy: f64) -> f64 {
        let first = self.perm[(xsb & 0xff) as usize] as i64;
        let index = (self.perm[((first + ysb) & 0xff) as usize] & 0x0e) as usize;
        GRADIENTS[index] * dx + GRADIENTS[index + 1] * dy
    }

    fn contribution(&self, xsb: i64, ysb: i64, dx: f64, dy: f64) -> f64 {
        let attn = 2.0 - dx * dx - dy * dy;
        if attn > 0.0 {
            attn.powi(4) * self.extrapolate(xsb, ysb, dx, dy)
        } else {
            0.0
        }
    }
}

impl NoiseFn<f64, 2> for SeededSimplex {
    fn get(&self, [x, y]: [f64; 2]) -> f64 {
        // Skew onto the rhombus lattice.
        let stretch = (x + y) * STRETCH;
        let (xs, ys) = (x + stretch, y + stretch);
        let (mut xsb, mut ysb) = (xs.floor() as i64, ys.floor() as i64);

        let squish = (xsb + ysb) as f64 * SQUISH;
        let (mut dx0, mut dy0) = (x - (xsb as f64 + squish), y - (ysb as f64 + squish));
        let (xins, yins) = (xs - xsb as f64, ys - ysb as f64);
        let in_sum = xins + yins;

        let mut value = self.contribution(xsb + 1, ysb, dx0 - 1.0 - SQUISH, dy0 - SQUISH);
        value += self.contribution(xsb, ysb + 1, dx0 - SQUISH, dy0 - 1.0 - SQUISH);

        // Extra vertex, picked by the triangle the point falls in.
        let extra = if in_sum <= 1.0 {
            let zins = 1.0 - in_sum;
            if zins > xins || zins > yins {
                if xins > yins {
                    (xsb + 1, ysb - 1, dx0 - 1.0, dy0 + 1.0)
                } else {
                    (xsb - 1, ysb + 1, dx0 + 1.0, dy0 - 1.0)
                }
            } else {
                (xsb + 1, ysb + 1, dx0 - 1.0 - 2.0 * SQUISH, dy0 - 1.0 - 2.0 * SQUISH)
            }
        } else {
            let zins = 2.0 - in_sum;
            let extra = if zins < xins || zins < yins {
                if xins > yins {
                    (xsb + 2, ysb, dx0 - 2.0 - 2.0 * SQUISH, dy0 - 2.0 * SQUISH)
                } else {
                    (xsb, ysb + 2, dx0 - 2.0 * SQUISH, dy0 - 2.0 - 2.0 * SQUISH)
                }
            } else {
                (xsb, ysb, dx0, dy0)
            };
            xsb += 1;
            ysb += 1;
            dx0 -= 1.0 + 2.0 * SQUISH;
            dy0 -= 1.0 + 2.0 * SQUISH;
            extra
        };

        value += self.contribution(xsb, ysb, dx0, dy0);
        value += self.contribution(extra.0, extra.1, extra.2, extra.3);
        value * NORM
    }
}
