// Domain layer: promo and order models plus the ports the core depends on.

pub mod model;
pub mod order;
pub mod ports;
