mod bend;
mod core;
mod crop;
mod fresnel;
mod mesh;
mod sampling;
mod spiral;

pub use bend::{
    BendDiagnostics, BendError, BendProperties, bend_arc_points, bend_mesh, bend_points,
};
pub use self::core::{BBox, Point3, Tolerance, Vec3};
pub use crop::{CropDiagnostics, CropError, crop_mesh};
pub use fresnel::{FresnelError, MAX_SERIES_TERMS, fresnel_c, fresnel_s};
pub use mesh::TrackMesh;
pub use sampling::{SampleError, sample_rail, sample_rail_range};
pub use spiral::{
    PartialTransitionIn, PartialTransitionOut, SinglePartialTransition, SingleTransition,
    SolveError, SpiralFit, find_a_partial_transition_in, find_a_partial_transition_out,
    find_a_single_partial_transition, find_a_single_transition, find_theta,
};

#[cfg(test)]
mod tests;
