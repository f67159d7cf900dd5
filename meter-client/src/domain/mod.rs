pub mod annotated;
pub mod date_format;
pub mod reading;

pub use annotated::{AnnotatedReading, SuspiciousMeter};
pub use reading::Reading;
