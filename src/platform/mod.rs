// Device and model integrations behind async traits

pub mod camera;
pub mod pose;
