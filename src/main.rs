use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::collections::HashMap;
use std::io::{self, Write};
use std::path::PathBuf;

use queryviz::chart_options::JsonSink;
use queryviz::data::{QueryResult, ResultSet};
use queryviz::graph::{Canvas, Sink};
use queryviz::logging::init_logger;
use queryviz::table::HtmlSink;
use queryviz::{render_viz, CategoryMode, OutputFormat, RenderOptions, UnmatchedField};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Output {
    /// Chart options / table documents as JSON
    Json,
    /// Table markup (tables only)
    Html,
    Png,
    Svg,
}

#[derive(Parser, Debug)]
#[command(name = "queryviz")]
#[command(about = "Render query results as charts or HTML tables", long_about = None)]
struct Args {
    /// Query result JSON file (reads stdin when omitted)
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Replace the query's result rows with the records of a CSV file
    #[arg(long)]
    result_csv: Option<PathBuf>,

    /// Container id the visualization is mounted in
    #[arg(short, long, default_value = "viz")]
    container: String,

    #[arg(short, long, value_enum, default_value_t = Output::Json)]
    output: Output,

    #[arg(long)]
    width: Option<u32>,

    #[arg(long)]
    height: Option<u32>,

    /// JSON render options file; flags override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// One axis slot per distinct category value
    #[arg(long)]
    distinct_categories: bool,

    /// Write unmatched record fields into the first table column
    #[arg(long)]
    legacy_table_fallback: bool,

    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn render_options(&self) -> Result<RenderOptions> {
        let mut options = match &self.config {
            Some(path) => RenderOptions::from_path(path)?,
            None => RenderOptions::default(),
        };
        if let Some(width) = self.width {
            options.width = width;
        }
        if let Some(height) = self.height {
            options.height = height;
        }
        match self.output {
            Output::Png => options.format = OutputFormat::Png,
            Output::Svg => options.format = OutputFormat::Svg,
            Output::Json | Output::Html => {}
        }
        if self.distinct_categories {
            options.category_mode = CategoryMode::Distinct;
        }
        if self.legacy_table_fallback {
            options.unmatched_fields = UnmatchedField::FirstColumn;
        }
        Ok(options)
    }

    fn read_query(&self) -> Result<QueryResult> {
        let mut query = match &self.input {
            Some(path) => {
                let file = std::fs::File::open(path)
                    .with_context(|| format!("Failed to open input file '{}'", path.display()))?;
                QueryResult::from_reader(io::BufReader::new(file))?
            }
            None => QueryResult::from_reader(io::stdin().lock())
                .context("Failed to read query result from stdin")?,
        };
        if let Some(path) = &self.result_csv {
            query.result = ResultSet::from_csv_path(path)?;
        }
        Ok(query)
    }
}

/// Render into a single surface and return whatever it produced.
fn render_with<S: Sink>(
    sink: S,
    args: &Args,
    query: &QueryResult,
    options: &RenderOptions,
) -> Result<Option<S>> {
    let mut surfaces = HashMap::from([(args.container.clone(), sink)]);
    let drawn = render_viz(&args.container, query, &mut surfaces, options)
        .context("Failed to render visualization")?;
    Ok(if drawn { surfaces.remove(&args.container) } else { None })
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logger(args.verbose);

    let options = args.render_options()?;
    let query = args.read_query()?;

    let bytes = match args.output {
        Output::Json => render_with(JsonSink::new(), &args, &query, &options)?
            .map(|sink| serde_json::to_vec_pretty(&sink.into_json()))
            .transpose()
            .context("Failed to serialize output")?,
        Output::Html => render_with(HtmlSink::new(), &args, &query, &options)?
            .map(|sink| sink.into_html().into_bytes()),
        Output::Png | Output::Svg => render_with(Canvas::new(&options), &args, &query, &options)?
            .and_then(Canvas::into_output),
    };

    let Some(bytes) = bytes else {
        return Ok(());
    };

    // Write output to stdout
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    handle
        .write_all(&bytes)
        .context("Failed to write output to stdout")?;
    handle.flush().context("Failed to flush stdout")?;

    Ok(())
}
