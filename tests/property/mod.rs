pub mod roadmap_shape;
