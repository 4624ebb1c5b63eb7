//! Pixel-box solver: maps a requested center and size onto a clipped,
//! integer-aligned pixel rectangle.
//!
//! Angular sizes are resolved by bisecting outward on the sphere in each of
//! the four cardinal pixel directions, which tolerates arbitrary non-linear
//! WCS distortions.

use tracing::trace;

use crate::coords::{Coords, Units};
use crate::error::{Error, Result};
use crate::header::Header;
use crate::wcs::Wcs;

/// Radians per degree.
pub const RAD_PER_DEG: f64 = 0.017_453_292_519_943_295_769_236_907_684_9;
/// Degrees per radian.
pub const DEG_PER_RAD: f64 = 57.295_779_513_082_320_876_798_154_814_1;
/// Radians per arcminute.
pub const RAD_PER_ARCMIN: f64 = 0.000_290_888_208_665_721_596_153_948_461_415;
/// Radians per arcsecond.
pub const RAD_PER_ARCSEC: f64 = 0.000_004_848_136_811_095_359_935_899_141_023_57;

/// A pixel-space cutout rectangle, one-based and inclusive on both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixBox {
    /// Smallest x pixel index.
    pub xmin: i64,
    /// Smallest y pixel index.
    pub ymin: i64,
    /// Largest x pixel index.
    pub xmax: i64,
    /// Largest y pixel index.
    pub ymax: i64,
}

impl PixBox {
    /// Number of pixels spanned along x.
    pub fn width(&self) -> i64 {
        self.xmax - self.xmin + 1
    }

    /// Number of pixels spanned along y.
    pub fn height(&self) -> i64 {
        self.ymax - self.ymin + 1
    }

    /// Axis minimum for `axis` 0 (x) or 1 (y).
    pub fn min(&self, axis: usize) -> i64 {
        if axis == 0 {
            self.xmin
        } else {
            self.ymin
        }
    }

    /// Extent along `axis` 0 (x) or 1 (y).
    pub fn extent(&self, axis: usize) -> i64 {
        if axis == 0 {
            self.width()
        } else {
            self.height()
        }
    }
}

/// Center coordinate of the pixel containing `x`, FITS conventions: pixel N
/// has center N and spans `[N - 0.5, N + 0.5)`.
fn pixcen(x: f64) -> f64 {
    (x + 0.5).floor()
}

/// Spherical coordinates in degrees to a unit vector in R3.
fn s2c(sky: [f64; 2]) -> [f64; 3] {
    let (sin_ra, cos_ra) = (RAD_PER_DEG * sky[0]).sin_cos();
    let (sin_dec, cos_dec) = (RAD_PER_DEG * sky[1]).sin_cos();
    [cos_ra * cos_dec, sin_ra * cos_dec, sin_dec]
}

/// Angular separation in radians between two vectors in R3.
fn dist(v1: &[f64; 3], v2: &[f64; 3]) -> f64 {
    let cs = v1[0] * v2[0] + v1[1] * v2[1] + v1[2] * v2[2];
    let x = v1[1] * v2[2] - v1[2] * v2[1];
    let y = v1[2] * v2[0] - v1[0] * v2[2];
    let z = v1[0] * v2[1] - v1[1] * v2[0];
    let ss = (x * x + y * y + z * z).sqrt();
    if ss != 0.0 || cs != 0.0 {
        ss.atan2(cs)
    } else {
        0.0
    }
}

/// Find the closest x or y coordinate separated by at least `size` radians
/// from the given center, searching along `dim` (0 = x, 1 = y) in direction
/// `dir` (+1 or -1).
///
/// Starting half a pixel out from the center pixel, the step doubles while
/// the probe is still inside the target separation, then halves once it has
/// overshot, until it falls below one pixel.
fn search(wcs: &Wcs, sky: [f64; 2], pix: [f64; 2], size: f64, dim: usize, dir: f64) -> Result<f64> {
    let cen = s2c(sky);
    let mut inc = dir;
    let mut p = [0.0f64; 2];
    p[1 - dim] = pix[1 - dim];
    p[dim] = pixcen(pix[dim]) + 0.5 * inc;
    let mut scale = 2.0;
    while inc.abs() >= 1.0 && p[0].is_finite() && p[1].is_finite() {
        let s = wcs.pixel_to_sky(p)?;
        let d = dist(&cen, &s2c(s));
        if d < size {
            inc *= scale;
            p[dim] += inc;
        } else if d > size {
            scale = 0.5;
            inc *= 0.5;
            p[dim] -= inc;
        } else {
            break;
        }
    }
    let edge = pixcen(p[dim]);
    trace!(dim, dir, edge, "bisection edge");
    if !edge.is_finite() {
        return Err(Error::internal("Cutout boundary search diverged"));
    }
    Ok(edge)
}

/// Map the given center and size to a pixel-space cutout box.
///
/// Returns `None` when the requested window does not overlap the image;
/// otherwise the box is clipped to `[1, naxis]` on both axes.
pub fn cutout_pixel_box(
    mut center: Coords,
    mut size: Coords,
    header: &Header,
    naxis: [i64; 2],
) -> Result<Option<PixBox>> {
    let xmin: f64;
    let xmax: f64;
    let ymin: f64;
    let ymax: f64;
    if center.units != Units::Pix || size.units != Units::Pix {
        // Center and/or size must be mapped through the image WCS.
        let wcs = Wcs::from_header(header)?;
        let sky;
        if center.units == Units::Pix {
            sky = wcs.pixel_to_sky(center.c)?;
        } else {
            match center.units {
                Units::Arcsec => {
                    center.c[0] /= 3600.0;
                    center.c[1] /= 3600.0;
                }
                Units::Arcmin => {
                    center.c[0] /= 60.0;
                    center.c[1] /= 60.0;
                }
                Units::Rad => {
                    center.c[0] *= DEG_PER_RAD;
                    center.c[1] *= DEG_PER_RAD;
                }
                _ => {}
            }
            if center.c[1] < -90.0 || center.c[1] > 90.0 {
                return Err(Error::bad_request(
                    "Center declination out of range [-90, 90] deg",
                ));
            }
            center.c[0] %= 360.0;
            if center.c[0] < 0.0 {
                center.c[0] += 360.0;
                if center.c[0] == 360.0 {
                    center.c[0] = 0.0;
                }
            }
            sky = center.c;
            center.c = wcs.sky_to_pixel(sky)?;
        }
        if size.c[0] < 0.0 || size.c[1] < 0.0 {
            return Err(Error::bad_request("Negative cutout size"));
        }
        if size.units != Units::Pix {
            match size.units {
                Units::Arcsec => {
                    size.c[0] *= RAD_PER_ARCSEC;
                    size.c[1] *= RAD_PER_ARCSEC;
                }
                Units::Arcmin => {
                    size.c[0] *= RAD_PER_ARCMIN;
                    size.c[1] *= RAD_PER_ARCMIN;
                }
                Units::Deg => {
                    size.c[0] *= RAD_PER_DEG;
                    size.c[1] *= RAD_PER_DEG;
                }
                _ => {}
            }
            xmin = search(&wcs, sky, center.c, size.c[0] * 0.5, 0, -1.0)?;
            xmax = search(&wcs, sky, center.c, size.c[0] * 0.5, 0, 1.0)?;
            ymin = search(&wcs, sky, center.c, size.c[1] * 0.5, 1, -1.0)?;
            ymax = search(&wcs, sky, center.c, size.c[1] * 0.5, 1, 1.0)?;
        } else {
            xmin = pixcen(center.c[0] - size.c[0] * 0.5);
            xmax = pixcen(center.c[0] + size.c[0] * 0.5);
            ymin = pixcen(center.c[1] - size.c[1] * 0.5);
            ymax = pixcen(center.c[1] + size.c[1] * 0.5);
        }
    } else {
        if size.c[0] < 0.0 || size.c[1] < 0.0 {
            return Err(Error::bad_request("Negative cutout size"));
        }
        xmin = pixcen(center.c[0] - size.c[0] * 0.5);
        xmax = pixcen(center.c[0] + size.c[0] * 0.5);
        ymin = pixcen(center.c[1] - size.c[1] * 0.5);
        ymax = pixcen(center.c[1] + size.c[1] * 0.5);
    }

    // The sub-image must overlap the image.
    if xmin > naxis[0] as f64 || ymin > naxis[1] as f64 || xmax < 1.0 || ymax < 1.0 {
        return Ok(None);
    }

    Ok(Some(PixBox {
        xmin: xmin.max(1.0) as i64,
        ymin: ymin.max(1.0) as i64,
        xmax: xmax.min(naxis[0] as f64) as i64,
        ymax: ymax.min(naxis[1] as f64) as i64,
    }))
}
