//! Primitive builders on top of truck's sweep API.
//!
//! truck has no built-in box/cylinder/sphere; everything is successive sweeps.
//! These are what scripts and tests feed into the viewer when they need real
//! BRep geometry.

use std::f64::consts::PI;
use truck_modeling::builder;
use truck_modeling::topology::{Solid, Wire};
use truck_modeling::{EuclideanSpace, Point3, Rad, Vector3};

use crate::types::KernelError;

/// Create a box solid via successive translational sweeps.
/// Origin at (0,0,0), extends to (w,h,d).
pub fn make_box(w: f64, h: f64, d: f64) -> Solid {
    let v = builder::vertex(Point3::new(0.0, 0.0, 0.0));
    let edge = builder::tsweep(&v, Vector3::new(w, 0.0, 0.0));
    let face = builder::tsweep(&edge, Vector3::new(0.0, h, 0.0));
    builder::tsweep(&face, Vector3::new(0.0, 0.0, d))
}

fn check_radius(radius: f64) -> Result<(), KernelError> {
    if radius.is_nan() || radius <= 0.0 {
        return Err(KernelError::Other {
            message: format!("radius must be positive, got {radius}"),
        });
    }
    Ok(())
}

/// Create a cylinder: circle wire, planar face, translational sweep.
/// Base centered at origin in XY plane, extending along +Z.
pub fn make_cylinder(radius: f64, height: f64) -> Result<Solid, KernelError> {
    check_radius(radius)?;
    let v = builder::vertex(Point3::new(radius, 0.0, 0.0));
    let wire = builder::rsweep(&v, Point3::origin(), Vector3::unit_z(), Rad(2.0 * PI));
    let face = builder::try_attach_plane(&[wire]).map_err(|e| KernelError::Other {
        message: format!("failed to create circular face: {e}"),
    })?;
    Ok(builder::tsweep(&face, Vector3::new(0.0, 0.0, height)))
}

/// Create a sphere centered at origin.
///
/// A meridian arc from the north to the south pole is revolved about +Z with
/// `builder::cone`, which collapses the pole edges into single vertices.
pub fn make_sphere(radius: f64) -> Result<Solid, KernelError> {
    check_radius(radius)?;
    let north = builder::vertex(Point3::new(0.0, 0.0, radius));
    let meridian: Wire = builder::rsweep(&north, Point3::origin(), Vector3::unit_y(), Rad(PI));
    let shell = builder::cone(&meridian, Vector3::unit_z(), Rad(2.0 * PI));
    Solid::try_new(vec![shell]).map_err(|e| KernelError::Other {
        message: format!("failed to close sphere shell: {e}"),
    })
}
