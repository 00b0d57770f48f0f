// Domain layer: core models and the marketplace port. No HTTP details here.

pub mod model;
pub mod ports;
