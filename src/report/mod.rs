/// Output layer: console tables, PNG charts, and the HTML profiling report.
pub mod charts;
pub mod console;
pub mod profile;
