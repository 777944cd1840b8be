use anyhow::Result;
use roadsense_windows::config::{ColumnAlias, ColumnMap, PipelineConfig};
use roadsense_windows::data_loading::{read_headers, read_table, ColumnLayout};
use roadsense_windows::windowing::WindowSegmenter;

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        println!("Usage: {} <table_file> [SOURCE=CANONICAL ...]", args[0]);
        std::process::exit(1);
    }

    let path = std::path::Path::new(&args[1]);
    let mut columns = ColumnMap::default();
    for raw in &args[2..] {
        let alias: ColumnAlias = raw.parse().map_err(anyhow::Error::msg)?;
        columns.insert(alias.source, alias.canonical);
    }

    let headers = read_headers(path)?;
    println!("\nColumns:");
    for header in &headers {
        let canonical = columns.canonical(header);
        if canonical == header.trim() {
            println!("  {}", header);
        } else {
            println!("  {} -> {}", header, canonical);
        }
    }

    match ColumnLayout::resolve(headers.iter().map(String::as_str), &columns) {
        Ok(_) => {
            let config = PipelineConfig {
                columns,
                ..PipelineConfig::default()
            };
            let table = read_table(path, &config)?;
            let segmenter = WindowSegmenter::new(&config.window);
            println!("\nRows: {}", table.len());
            println!(
                "Windows at default settings: {}",
                segmenter.window_count(table.len())
            );
        }
        Err(e) => println!("\nNot eligible: {}", e),
    }

    Ok(())
}
