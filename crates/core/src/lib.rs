pub mod shared {
    pub mod bounding_box;
    pub mod constants;
    pub mod frame;
    pub mod model_resolver;
    pub mod session_params;
    pub mod video_metadata;
}

pub mod video {
    pub mod domain {
        pub mod frame_display;
        pub mod video_reader;
        pub mod video_writer;
    }
    pub mod infrastructure;
}

pub mod detection {
    pub mod domain {
        pub mod face_detector;
    }
    pub mod infrastructure;
}

pub mod estimation {
    pub mod domain {
        pub mod attribute_estimator;
        pub mod senior_classifier;
    }
    pub mod infrastructure;
}

pub mod annotation {
    pub mod domain {
        pub mod frame_annotator;
    }
    pub mod infrastructure;
}

pub mod event_log {
    pub mod domain {
        pub mod senior_event_log;
    }
    pub mod infrastructure;
}

pub mod pipeline {
    pub mod annotated_frame_cache;
    pub mod detect_seniors_use_case;
    pub mod pipeline_logger;
    pub mod run_summary;
}
