use std::path::PathBuf;

use crate::report::charts::ChartConfig;

// ---------------------------------------------------------------------------
// Pipeline configuration
// ---------------------------------------------------------------------------

/// Everything a run needs besides the data itself.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Record file to analyse.
    pub input: PathBuf,
    /// Directory receiving the charts and the HTML report.
    pub output_dir: PathBuf,
    /// File name of the HTML report inside `output_dir`.
    pub report_file: String,
    /// Title printed at the top of the HTML report.
    pub report_title: String,
    /// Rows shown in the console preview.
    pub preview_rows: usize,
    /// Only write chart files, never open them in a viewer.
    pub headless: bool,
}

impl PipelineConfig {
    pub fn new(input: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            output_dir: PathBuf::from("outputs"),
            report_file: "rapport_vehicules.html".to_string(),
            report_title: "Rapport d'Analyse des Ventes de Véhicules".to_string(),
            preview_rows: 5,
            headless: true,
        }
    }

    /// Read the input path from the first positional argument.
    pub fn from_args(mut args: impl Iterator<Item = String>) -> Option<Self> {
        args.nth(1).map(Self::new)
    }

    pub fn report_path(&self) -> PathBuf {
        self.output_dir.join(&self.report_file)
    }

    pub fn chart_config(&self) -> ChartConfig {
        ChartConfig {
            output_dir: self.output_dir.clone(),
            headless: self.headless,
            ..ChartConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_write_to_outputs() {
        let config = PipelineConfig::new("car_prices.csv");
        assert_eq!(config.report_path(), PathBuf::from("outputs/rapport_vehicules.html"));
        assert!(config.headless);
        assert_eq!(config.chart_config().output_dir, PathBuf::from("outputs"));
    }

    #[test]
    fn input_comes_from_first_argument() {
        let args = ["vehicle-sales", "data/cars.csv", "ignored"].map(String::from);
        let config = PipelineConfig::from_args(args.into_iter()).unwrap();
        assert_eq!(config.input, PathBuf::from("data/cars.csv"));

        let bare = ["vehicle-sales"].map(String::from);
        assert!(PipelineConfig::from_args(bare.into_iter()).is_none());
    }
}
