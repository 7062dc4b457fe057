pub mod csv_event_log;
