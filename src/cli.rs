//! Command-line front end for the fetch and analyze phases.
use std::path::PathBuf;
use std::time::Duration;

use chrono::NaiveDate;
use log::info;
use rust_decimal::Decimal;

use crate::aggregate::{Aggregator, Bucket, Filter, GroupKey, PriceField, Statistic};
use crate::error::{Phase, PriceError, Result};
use crate::models::{AggregateResult, FetchQuery};
use crate::render::{self, ChartKind, ChartSpec, Theme};
use crate::{config, Pipeline};

pub const HELP: &str = include_str!("cli_help.txt");

#[derive(Debug)]
pub enum Command {
    Fetch(FetchArgs),
    Analyze(AnalyzeArgs),
    Help,
}

#[derive(Debug)]
pub struct FetchArgs {
    pub query: FetchQuery,
    pub out: PathBuf,
    pub endpoint: Option<String>,
    pub page_size: Option<u32>,
    pub max_pages: Option<u32>,
    pub delay: Option<Duration>,
    pub retries: Option<u32>,
}

#[derive(Debug)]
pub struct AnalyzeArgs {
    pub data: PathBuf,
    pub group_by: GroupKey,
    /// Price fields; the table uses the first, line series draw each.
    pub fields: Vec<PriceField>,
    pub stat: Statistic,
    pub filter: Filter,
    /// Explicit groups to report, empty ones included.
    pub keys: Vec<String>,
    pub chart: ChartKind,
    pub outliers: Option<f64>,
    pub title: Option<String>,
    pub theme: Theme,
    pub out: Option<PathBuf>,
}

pub fn parse_args<I: IntoIterator<Item = String>>(args: I) -> Result<Command> {
    let mut args = args.into_iter();
    match args.next().as_deref() {
        Some("fetch") => parse_fetch(args).map(Command::Fetch),
        Some("analyze") => parse_analyze(args).map(Command::Analyze),
        Some("-h") | Some("--help") | Some("help") | None => Ok(Command::Help),
        Some(other) => Err(invalid(format!("Unknown command: {}", other))),
    }
}

pub fn run(command: Command) -> Result<()> {
    match command {
        Command::Help => {
            println!("{}", HELP);
            Ok(())
        }
        Command::Fetch(args) => run_fetch(args),
        Command::Analyze(args) => run_analyze(args),
    }
}

fn run_fetch(args: FetchArgs) -> Result<()> {
    let mut builder = Pipeline::builder().store_path(&args.out).max_pages(args.max_pages);
    if let Some(url) = &args.endpoint {
        builder = builder.endpoint(url);
    }
    if let Some(size) = args.page_size {
        builder = builder.page_size(size);
    }
    if let Some(delay) = args.delay {
        builder = builder.request_delay(delay);
    }
    if let Some(retries) = args.retries {
        builder = builder.retry(crate::RetryPolicy {
            max_attempts: retries.saturating_add(1),
            ..crate::RetryPolicy::default()
        });
    }
    let pipeline = builder.build()?;
    info!("Starting fetch with {}", pipeline);
    let report = pipeline.fetch_and_persist(&args.query)?;
    println!("{}", report);
    Ok(())
}

fn run_analyze(args: AnalyzeArgs) -> Result<()> {
    let pipeline = Pipeline::builder().store_path(&args.data).build()?;
    let dataset = pipeline.load()?.filter(&args.filter);
    let processed = dataset.len();
    let aggregator = Aggregator::new(&dataset);
    let field = args.table_field();

    let result: AggregateResult = if args.keys.is_empty() {
        aggregator.aggregate(args.group_by, field, args.stat)
    } else {
        let keys: Vec<&str> = args.keys.iter().map(String::as_str).collect();
        aggregator.aggregate_keys(args.group_by, field, args.stat, &keys)
    };
    print_table(&result, args.stat, field);

    let Some(out) = &args.out else {
        return Ok(());
    };
    let spec = ChartSpec {
        kind: args.chart,
        title: args.title.clone().unwrap_or_else(|| {
            format!("{} {} by {:?}", args.stat, field.column(), args.group_by)
        }),
        x_label: format!("{:?}", args.group_by),
        theme: args.theme,
        ..ChartSpec::default()
    };

    let drawn = if args.draws_series() {
        let bucket = match args.group_by {
            GroupKey::Date(bucket) => bucket,
            _ => Bucket::Week,
        };
        let products: Vec<&str> = args.filter.products.iter().map(String::as_str).collect();
        let series = aggregator.series(&products, &args.series_fields(), bucket, args.outliers);
        render::render_series(
            &series,
            &ChartSpec {
                x_label: "Date".to_string(),
                ..spec
            },
            out,
        )
    } else {
        render::render_aggregate(&result, &spec, out)
    };
    drawn.map_err(|e| e.aborted(Phase::Render, processed))
}

fn print_table(result: &AggregateResult, stat: Statistic, field: PriceField) {
    println!("group\tcount\t{}({})", stat, field.column());
    for (key, summary) in result {
        let value = summary
            .value
            .map(|v| v.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!("{}\t{}\t{}", key, summary.count, value);
    }
}

fn parse_fetch<I: Iterator<Item = String>>(mut args: I) -> Result<FetchArgs> {
    let mut out = FetchArgs {
        query: FetchQuery::default(),
        out: config::default_store_path(),
        endpoint: None,
        page_size: None,
        max_pages: None,
        delay: None,
        retries: None,
    };
    while let Some(a) = args.next() {
        match a.as_str() {
            "--from" => out.query.from = Some(parse_date(&value(&mut args, &a)?)?),
            "--to" => out.query.to = Some(parse_date(&value(&mut args, &a)?)?),
            "--category-id" => out.query.category_id = Some(parse_num(&value(&mut args, &a)?)?),
            "--parent-category-id" => {
                out.query.parent_category_id = Some(parse_num(&value(&mut args, &a)?)?)
            }
            "--product" => out.query.product = Some(value(&mut args, &a)?),
            "-o" | "--out" => out.out = PathBuf::from(value(&mut args, &a)?),
            "--endpoint" => out.endpoint = Some(value(&mut args, &a)?),
            "--page-size" => out.page_size = Some(parse_num(&value(&mut args, &a)?)?),
            "--max-pages" => out.max_pages = Some(parse_num(&value(&mut args, &a)?)?),
            "--delay-ms" => {
                let ms: u64 = parse_num(&value(&mut args, &a)?)?;
                out.delay = Some(Duration::from_millis(ms));
            }
            "--retries" => out.retries = Some(parse_num(&value(&mut args, &a)?)?),
            _ => return Err(invalid(format!("Unknown arg: {}", a))),
        }
    }
    if let (Some(from), Some(to)) = (out.query.from, out.query.to) {
        if from > to {
            return Err(invalid(format!("--from {} is after --to {}", from, to)));
        }
    }
    Ok(out)
}

fn parse_analyze<I: Iterator<Item = String>>(mut args: I) -> Result<AnalyzeArgs> {
    let mut out = AnalyzeArgs {
        data: config::default_store_path(),
        group_by: GroupKey::Category,
        fields: Vec::new(),
        stat: Statistic::Mean,
        filter: Filter::default(),
        keys: Vec::new(),
        chart: ChartKind::Bar,
        outliers: None,
        title: None,
        theme: Theme::Light,
        out: None,
    };
    while let Some(a) = args.next() {
        match a.as_str() {
            "--data" => out.data = PathBuf::from(value(&mut args, &a)?),
            "--group-by" => out.group_by = value(&mut args, &a)?.parse()?,
            "--field" => out.fields.push(value(&mut args, &a)?.parse()?),
            "--stat" => out.stat = value(&mut args, &a)?.parse()?,
            "--from" => out.filter.from = Some(parse_date(&value(&mut args, &a)?)?),
            "--to" => out.filter.to = Some(parse_date(&value(&mut args, &a)?)?),
            "--category" => out.filter.categories.push(value(&mut args, &a)?),
            "--product" => out.filter.products.push(value(&mut args, &a)?),
            "--place" => out.filter.places.push(value(&mut args, &a)?),
            "--spec" => out.filter.specs.push(value(&mut args, &a)?),
            "--min-price" => out.filter.min_price = Some(parse_decimal(&value(&mut args, &a)?)?),
            "--max-price" => out.filter.max_price = Some(parse_decimal(&value(&mut args, &a)?)?),
            "--key" => out.keys.push(value(&mut args, &a)?),
            "--chart" => {
                let v = value(&mut args, &a)?;
                out.chart = match v.to_ascii_lowercase().as_str() {
                    "bar" => ChartKind::Bar,
                    "line" => ChartKind::Line,
                    other => return Err(invalid(format!("Unknown chart: {}", other))),
                };
            }
            "--outliers" => out.outliers = Some(parse_num(&value(&mut args, &a)?)?),
            "--title" => out.title = Some(value(&mut args, &a)?),
            "--dark" => out.theme = Theme::Dark,
            "-o" | "--out" => out.out = Some(PathBuf::from(value(&mut args, &a)?)),
            _ => return Err(invalid(format!("Unknown arg: {}", a))),
        }
    }
    if out.fields.len() > 1 && !out.draws_series() {
        return Err(invalid(
            "several --field values need --chart line and --product".to_string(),
        ));
    }
    if out.outliers.is_some() && !out.draws_series() {
        return Err(invalid(
            "--outliers applies only to --chart line with --product".to_string(),
        ));
    }
    Ok(out)
}

impl AnalyzeArgs {
    /// Whether the chart is a per-product time series.
    pub fn draws_series(&self) -> bool {
        self.chart == ChartKind::Line && !self.filter.products.is_empty()
    }

    /// Field summarized in the table.
    pub fn table_field(&self) -> PriceField {
        self.fields.first().copied().unwrap_or(PriceField::Average)
    }

    /// Fields drawn as series, low and high unless chosen.
    pub fn series_fields(&self) -> Vec<PriceField> {
        if self.fields.is_empty() {
            vec![PriceField::Low, PriceField::High]
        } else {
            self.fields.clone()
        }
    }
}

fn value<I: Iterator<Item = String>>(args: &mut I, flag: &str) -> Result<String> {
    args.next()
        .ok_or_else(|| invalid(format!("Missing value for {}", flag)))
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|_| invalid(format!("Invalid date (want YYYY-MM-DD): {}", s)))
}

fn parse_num<T: std::str::FromStr>(s: &str) -> Result<T> {
    s.parse().map_err(|_| invalid(format!("Invalid number: {}", s)))
}

fn parse_decimal(s: &str) -> Result<Decimal> {
    s.parse().map_err(|_| invalid(format!("Invalid price: {}", s)))
}

fn invalid(msg: String) -> PriceError {
    PriceError::InvalidArgument(msg)
}
