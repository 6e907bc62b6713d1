pub mod document;
pub mod service_status;
