pub mod crs;
pub mod geometry;
pub mod pointcloud;
pub mod tile;
