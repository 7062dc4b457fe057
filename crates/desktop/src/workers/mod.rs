pub mod detection_worker;
pub mod model_cache;
