//! Object extent from a vertex array
//!
//! `dimension = max - min` and `position = max - dimension / 2`, both taken
//! componentwise over every vertex of the object.

use nalgebra::{Point3, Vector3};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeometryError {
    #[error("vertex array is empty")]
    EmptyVertexArray,
    #[error("vertex {0} has a non-finite coordinate")]
    NonFiniteVertex(usize),
}

/// Axis-aligned extent and center of an object
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObjectGeometry {
    pub dimension: Vector3<f64>,
    pub position: Point3<f64>,
}

/// Min and max corners of the vertices
pub fn bounding_box(vertices: &[Point3<f64>]) -> Result<(Point3<f64>, Point3<f64>), GeometryError> {
    let (first, rest) = vertices
        .split_first()
        .ok_or(GeometryError::EmptyVertexArray)?;

    let mut pmin = *first;
    let mut pmax = *first;
    for (i, v) in vertices.iter().enumerate() {
        if !v.coords.iter().all(|c| c.is_finite()) {
            return Err(GeometryError::NonFiniteVertex(i));
        }
    }
    for v in rest {
        pmin = pmin.inf(v);
        pmax = pmax.sup(v);
    }

    Ok((pmin, pmax))
}

pub fn derive_geometry(vertices: &[Point3<f64>]) -> Result<ObjectGeometry, GeometryError> {
    let (pmin, pmax) = bounding_box(vertices)?;
    let dimension = pmax - pmin;
    let position = pmax - dimension / 2.0;
    Ok(ObjectGeometry {
        dimension,
        position,
    })
}
