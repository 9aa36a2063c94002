use anyhow::Result;

use crate::config::PipelineConfig;
use crate::data::model::RecordTable;
use crate::data::{clean, loader};
use crate::report::{charts, console, profile};

/// Load, clean, analyse, chart, report and summarise one input file.
///
/// A load failure aborts the run.  Chart and report failures are logged and
/// the remaining stages still run.
pub fn run(config: &PipelineConfig) -> Result<RecordTable> {
    log::info!("loading {}", config.input.display());
    let raw = loader::load_file(&config.input)?;
    log::info!("loaded {} rows, {} columns", raw.len(), raw.columns.len());

    let table = clean::clean(raw);

    console::print_analysis(&table, config.preview_rows)?;

    match charts::render_all(&table, &config.chart_config()) {
        Ok(paths) => log::info!("{} charts written to {}", paths.len(), config.output_dir.display()),
        Err(e) => log::error!("chart rendering failed: {e:#}"),
    }

    let report_path = config.report_path();
    match profile::write_report(&table, &config.report_title, &report_path) {
        Ok(()) => log::info!("report written to {}", report_path.display()),
        Err(e) => log::error!("report generation failed: {e:#}"),
    }

    console::print_summary(&table)?;
    log::info!("analysis complete");
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::loader::LoadError;
    use crate::report::charts::CHART_NAMES;

    const SALES: &str = "\
year,make,model,trim,body,transmission,state,condition,odometer,color,interior,seller,mmr,sellingprice,saledate
2015,Kia,Sorento,LX,SUV,automatic,ca,5,16639,white,black,kia motors,20500,21500,Tue Dec 16 2014
2015,Kia,Sorento,LX,SUV,automatic,ca,5,16639,white,black,kia motors,20500,21500,Tue Dec 16 2014
2014,BMW,3 Series,328i,Sedan,automatic,ca,45,1331,gray,black,financial,31900,30000,Thu Jan 15 2015
2012, ford ,Fusion,SE,sedan,automatic,fl,3,30000,blue,gray,ford credit,10000,9800,Wed Feb 04 2015
,Kia,Optima,LX,Sedan,automatic,ca,4,20000,black,black,kia motors,15000,14000,Tue Dec 16 2014
2013,,Sorento,EX,suv,automatic,tx,4,25000,red,black,dealer,17000,16500,Tue Jan 06 2015
1975,Chevrolet,Impala,LT,Sedan,automatic,ca,2,90000,white,gray,dealer,3000,2500,Tue Dec 16 2014
2011,Nissan,Altima,S,Sedan,automatic,ca,3,60000,silver,black,dealer,8000,0,Tue Dec 16 2014
";

    fn config_for(dir: &std::path::Path) -> PipelineConfig {
        let input = dir.join("car_prices.csv");
        std::fs::write(&input, SALES).unwrap();
        PipelineConfig {
            output_dir: dir.join("outputs"),
            ..PipelineConfig::new(input)
        }
    }

    #[test]
    fn end_to_end_writes_charts_and_report() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_for(dir.path());

        let table = run(&config).unwrap();
        // duplicate, null year, 1975 and zero price are gone
        assert_eq!(table.len(), 4);
        let make = table.column_index("make").unwrap();
        let makes: Vec<_> = table.column_cells(make).map(|c| c.to_string()).collect();
        assert_eq!(makes, ["kia", "bmw", "ford", "kia"]);

        for name in CHART_NAMES {
            assert!(config.output_dir.join(format!("{name}.png")).exists(), "{name}");
        }
        let html = std::fs::read_to_string(config.report_path()).unwrap();
        assert!(html.contains(&config.report_title));
    }

    #[test]
    fn missing_input_aborts_before_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let config = PipelineConfig {
            output_dir: dir.path().join("outputs"),
            ..PipelineConfig::new(dir.path().join("absent.csv"))
        };

        let err = run(&config).unwrap_err();
        assert!(matches!(err.downcast_ref::<LoadError>(), Some(LoadError::Io(_))));
        assert!(!config.output_dir.exists());
    }

    #[test]
    fn report_failure_still_returns_cleaned_table() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_for(dir.path());
        // a directory where the report file should go
        std::fs::create_dir_all(config.report_path()).unwrap();

        let table = run(&config).unwrap();
        assert_eq!(table.len(), 4);
        assert!(config.report_path().is_dir());
        for name in CHART_NAMES {
            assert!(config.output_dir.join(format!("{name}.png")).is_file(), "{name}");
        }
    }

    #[test]
    fn chart_failure_still_writes_report() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_for(dir.path());
        std::fs::create_dir_all(config.output_dir.join(format!("{}.png", CHART_NAMES[0]))).unwrap();

        let table = run(&config).unwrap();
        assert_eq!(table.len(), 4);
        let html = std::fs::read_to_string(config.report_path()).unwrap();
        assert!(html.contains(&config.report_title));
    }
}
