pub mod cpu_box_annotator;
pub mod frame_canvas;
